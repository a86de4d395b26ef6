use egui::Color32;

/// Surface background; also the color the eraser paints with.
pub const BACKGROUND: Color32 = Color32::WHITE;

/// Parse `#rrggbb`, `#rgb` or `rgb(r, g, b)` into an opaque color.
pub fn parse_color(input: &str) -> Option<Color32> {
    let input = input.trim();
    if let Some(hex) = input.strip_prefix('#') {
        return parse_hex(hex);
    }
    let inner = input
        .strip_prefix("rgba(")
        .or_else(|| input.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    let mut channels = inner.split(',').map(|c| c.trim().parse::<u8>());
    let r = channels.next()?.ok()?;
    let g = channels.next()?.ok()?;
    let b = channels.next()?.ok()?;
    Some(Color32::from_rgb(r, g, b))
}

fn parse_hex(hex: &str) -> Option<Color32> {
    if !hex.is_ascii() {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        6 => Some(Color32::from_rgb(
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        )),
        3 => {
            let expand = |s: &str| channel(s).map(|v| v * 17);
            Some(Color32::from_rgb(
                expand(&hex[0..1])?,
                expand(&hex[1..2])?,
                expand(&hex[2..3])?,
            ))
        }
        _ => None,
    }
}

/// Lowercase `#rrggbb`; alpha is dropped.
pub fn to_hex(color: Color32) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r(), color.g(), color.b())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!(parse_color("#ff0000"), Some(Color32::from_rgb(255, 0, 0)));
        assert_eq!(parse_color("#0000FF"), Some(Color32::from_rgb(0, 0, 255)));
        assert_eq!(parse_color("#fa0"), Some(Color32::from_rgb(255, 170, 0)));
        assert_eq!(parse_color("#12345"), None);
        assert_eq!(parse_color("#gg0000"), None);
    }

    #[test]
    fn test_parse_rgb_function() {
        assert_eq!(parse_color("rgb(0, 128, 255)"), Some(Color32::from_rgb(0, 128, 255)));
        assert_eq!(parse_color("rgba(1,2,3,0.5)"), Some(Color32::from_rgb(1, 2, 3)));
        assert_eq!(parse_color("rgb(300, 0, 0)"), None);
        assert_eq!(parse_color("blue"), None);
    }

    #[test]
    fn test_hex_round_trip() {
        let color = Color32::from_rgb(0x1f, 0xa0, 0x07);
        assert_eq!(to_hex(color), "#1fa007");
        assert_eq!(parse_color(&to_hex(color)), Some(color));
    }
}
