use egui::{Color32, Slider};

use crate::app::CanvasDrawApp;
use crate::brush::{BrushMode, ERASER_SIZE_RANGE, ERASER_SIZE_STEP, PENCIL_SIZE_RANGE};

pub fn toolbar(app: &mut CanvasDrawApp, ctx: &egui::Context) {
    egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
        ui.horizontal_wrapped(|ui| {
            // brush settings are fixed for the stroke in progress
            let drawing = app.context().is_drawing();
            ui.add_enabled_ui(!drawing, |ui| {
                quick_colors(app, ui);
                ui.separator();
                brush_controls(app, ui);
            });
            ui.separator();

            let can_undo = app.context().history().can_undo() && !app.context().is_drawing();
            if ui.add_enabled(can_undo, egui::Button::new("Undo")).clicked() {
                app.undo();
            }
            if ui.button("Clear").clicked() {
                log::info!("Clearing canvas");
                app.context_mut().clear();
            }
            ui.separator();

            ui.label("Name:");
            ui.add(egui::TextEdit::singleline(app.filename_mut()).desired_width(140.0));
            let busy = app.is_uploading();
            let save = if busy { "Saving..." } else { "Save" };
            if ui.add_enabled(!busy, egui::Button::new(save)).clicked() {
                app.save();
            }
            if ui.button("Download").clicked() {
                app.download();
            }
        });
    });
}

fn quick_colors(app: &mut CanvasDrawApp, ui: &mut egui::Ui) {
    let palette = app.context().quick_colors().to_vec();
    let selected = app.context().brush().color();
    for (index, color) in palette.into_iter().enumerate() {
        let mut edited = color;
        let response = egui::color_picker::color_edit_button_srgba(
            ui,
            &mut edited,
            egui::color_picker::Alpha::Opaque,
        );
        if edited != color {
            app.context_mut().set_quick_color(index, edited);
        } else if response.clicked() || response.secondary_clicked() {
            app.context_mut().select_quick_color(index);
        }
        if color == selected && app.context().brush().mode() == BrushMode::Draw {
            ui.painter().rect_stroke(
                response.rect.expand(2.0),
                2.0,
                egui::Stroke::new(2.0, ui.visuals().selection.stroke.color),
            );
        }
    }
}

fn brush_controls(app: &mut CanvasDrawApp, ui: &mut egui::Ui) {
    let mut color = app.context().brush().color();
    ui.label("Color:");
    if egui::color_picker::color_edit_button_srgba(ui, &mut color, egui::color_picker::Alpha::Opaque)
        .changed()
    {
        app.context_mut().set_color(color);
    }

    let erasing = app.context().brush().mode() == BrushMode::Erase;
    if ui.selectable_label(erasing, "Eraser").clicked() {
        app.context_mut().toggle_eraser();
    }

    let mut size = app.context().brush().active_width();
    let slider = if erasing {
        Slider::new(&mut size, ERASER_SIZE_RANGE)
            .step_by(f64::from(ERASER_SIZE_STEP))
            .text("Eraser")
    } else {
        Slider::new(&mut size, PENCIL_SIZE_RANGE).text("Pencil")
    };
    if ui.add(slider).changed() {
        app.context_mut().set_active_width(size);
    }
}

pub fn status_bar(app: &mut CanvasDrawApp, ctx: &egui::Context) {
    egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            let surface = app.context().surface();
            ui.label(format!(
                "{}x{} @{}x",
                surface.pixel_width(),
                surface.pixel_height(),
                surface.device_pixel_ratio()
            ));
            ui.separator();
            ui.label(format!("Undo: {}", app.context().history().len()));
            if let Some(status) = app.status() {
                ui.separator();
                ui.colored_label(Color32::from_gray(90), status);
            }
        });
    });
}

pub fn token_prompt(app: &mut CanvasDrawApp, ctx: &egui::Context) {
    let mut submit = false;
    let mut cancel = false;
    let Some(input) = app.token_input_mut() else {
        return;
    };
    egui::Window::new("Authentication")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
        .show(ctx, |ui| {
            ui.label("Enter your upload token:");
            let response = ui.add(egui::TextEdit::singleline(input).password(true));
            if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                submit = true;
            }
            ui.horizontal(|ui| {
                submit |= ui.button("OK").clicked();
                cancel = ui.button("Cancel").clicked();
            });
        });
    if submit {
        app.submit_token();
    } else if cancel {
        app.cancel_token_prompt();
    }
}
