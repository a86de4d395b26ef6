mod central_panel;
mod tools_panel;

pub use central_panel::{CanvasTexture, central_panel as canvas_panel};
pub use tools_panel::{status_bar, token_prompt, toolbar};
