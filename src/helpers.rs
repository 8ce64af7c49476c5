use crate::mlp::Evaluation;

/// `Baseline Error: 7.42%`
pub fn baseline_error(evaluation: &Evaluation) -> String {
    format!("Baseline Error: {:.2}%", evaluation.error_percent())
}

/// Renders a grayscale image as block characters inside a border.
pub fn render_digit(pixels: &[u8], rows: usize, cols: usize) -> String {
    let mut out = String::new();
    out.push('┌');
    out.push_str(&"──".repeat(cols));
    out.push_str("┐\n");

    for y in 0..rows {
        out.push('│');
        for x in 0..cols {
            let val = pixels[y * cols + x];
            let cell = if val > 127 {
                "██"
            } else if val > 25 {
                "░░"
            } else {
                "  "
            };
            out.push_str(cell);
        }
        out.push_str("│\n");
    }

    out.push('└');
    out.push_str(&"──".repeat(cols));
    out.push('┘');
    out
}
