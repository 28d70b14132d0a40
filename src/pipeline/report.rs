//! Fixed-width bill-of-materials report.
//!
//! Pure formatting over an [`ExtractionResult`]: absent values print as
//! `N/A`, absent confidences as `0%`, and an empty section is left out
//! entirely rather than printed as a bare header.

use crate::model::{ExtractionResult, FittingSpec, FlangeSpec, PipeSpec, ValveSpec};
use std::fmt::Write;

/// Placeholder for any field the model did not supply.
pub const NOT_AVAILABLE: &str = "N/A";

const WIDTH: usize = 80;

/// Render the full report. The returned string ends with a newline.
pub fn render_report(result: &ExtractionResult) -> String {
    let mut out = String::with_capacity(2048);
    let major = "=".repeat(WIDTH);

    // `write!` into a String cannot fail.
    let _ = writeln!(out, "{major}");
    let _ = writeln!(out, "EXTRACTED BILL OF MATERIALS");
    let _ = writeln!(out, "{major}");

    if let Some(d) = &result.drawing {
        let _ = writeln!(out, "\nDrawing: {} - {}", text(&d.number), text(&d.title));
        let _ = writeln!(out, "Scale: {} | Revision: {}", text(&d.scale), text(&d.revision));
    }

    section(&mut out, "PIPES", &result.pipes, pipe_block);
    section(&mut out, "FITTINGS", &result.fittings, fitting_block);
    section(&mut out, "VALVES", &result.valves, valve_block);
    section(&mut out, "FLANGES", &result.flanges, flange_block);

    let _ = writeln!(out, "\n{major}");
    let _ = writeln!(
        out,
        "Overall Confidence: {}",
        percent(result.overall_confidence)
    );

    let low = result.low_confidence_count();
    if low > 0 {
        let _ = writeln!(out, "Items below 70% confidence: {low}");
    }

    if !result.notes.is_empty() {
        let _ = writeln!(out, "\nNotes:");
        for note in &result.notes {
            let _ = writeln!(out, "  • {note}");
        }
    }
    let _ = writeln!(out, "{major}");
    out
}

fn section<T>(out: &mut String, title: &str, items: &[T], block: fn(&mut String, &T)) {
    if items.is_empty() {
        return;
    }
    let minor = "-".repeat(WIDTH);
    let _ = writeln!(out, "\n{minor}");
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{minor}");
    for item in items {
        block(out, item);
    }
}

fn pipe_block(out: &mut String, p: &PipeSpec) {
    let _ = writeln!(out, "\nLine: {}", text(&p.line_number));
    let _ = writeln!(out, "  Size: {} {}", text(&p.size), text(&p.schedule));
    let _ = writeln!(out, "  Material: {}", text(&p.material));
    let _ = writeln!(out, "  Service: {}", text(&p.service));
    let _ = writeln!(out, "  Length: {} ft", length(p.length_ft));
    let _ = writeln!(out, "  Confidence: {}", percent(p.confidence));
}

fn fitting_block(out: &mut String, f: &FittingSpec) {
    let _ = writeln!(out, "\n{}× {}", quantity(f.quantity), text(&f.kind));
    let _ = writeln!(out, "  Size: {}", text(&f.size));
    let _ = writeln!(out, "  Material: {}", text(&f.material));
    let _ = writeln!(out, "  Confidence: {}", percent(f.confidence));
}

fn valve_block(out: &mut String, v: &ValveSpec) {
    let _ = writeln!(out, "\n{}× {}", quantity(v.quantity), text(&v.kind));
    let _ = writeln!(out, "  Size: {} {}", text(&v.size), text(&v.pressure_class));
    let _ = writeln!(out, "  Operator: {}", text(&v.operator));
    let _ = writeln!(out, "  Material: {}", text(&v.material));
    let _ = writeln!(out, "  Confidence: {}", percent(v.confidence));
}

fn flange_block(out: &mut String, f: &FlangeSpec) {
    let _ = writeln!(out, "\n{}× {}", quantity(f.quantity), text(&f.kind));
    let _ = writeln!(out, "  Size: {} {}", text(&f.size), text(&f.pressure_class));
    let _ = writeln!(out, "  Material: {}", text(&f.material));
    let _ = writeln!(out, "  Confidence: {}", percent(f.confidence));
}

// ── Field formatting ─────────────────────────────────────────────────────────

fn text(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(NOT_AVAILABLE)
}

fn quantity(value: Option<u32>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |q| q.to_string())
}

/// Lengths keep one decimal when whole (`120.0`), otherwise print as given.
///
/// An integer `120` in the reply also prints as `120.0`.
fn length(value: Option<f64>) -> String {
    match value {
        Some(ft) if ft.fract() == 0.0 => format!("{ft:.1}"),
        Some(ft) => ft.to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Rounded percentage; absent → `0%`.
pub fn percent(confidence: Option<f64>) -> String {
    format!("{:.0}%", confidence.unwrap_or(0.0) * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DrawingInfo;

    fn sample() -> ExtractionResult {
        ExtractionResult {
            drawing: Some(DrawingInfo {
                number: Some("P-042".into()),
                title: Some("Cooling Water Supply".into()),
                scale: Some("1:50".into()),
                revision: None,
                ..Default::default()
            }),
            pipes: vec![PipeSpec {
                line_number: Some("CW-4-CS-101".into()),
                size: Some("4\"".into()),
                schedule: Some("Sch 40".into()),
                material: Some("Carbon Steel".into()),
                service: Some("Cooling Water".into()),
                length_ft: Some(125.5),
                confidence: Some(0.95),
                ..Default::default()
            }],
            valves: vec![ValveSpec {
                kind: Some("Gate Valve".into()),
                size: Some("4\"".into()),
                pressure_class: Some("Class 150".into()),
                operator: Some("Manual".into()),
                quantity: Some(2),
                confidence: Some(0.91),
                ..Default::default()
            }],
            overall_confidence: Some(0.92),
            notes: vec!["Scale bar partly obscured".into()],
            ..Default::default()
        }
    }

    #[test]
    fn full_report_layout() {
        let report = render_report(&sample());
        assert!(report.starts_with(&"=".repeat(80)));
        assert!(report.contains("EXTRACTED BILL OF MATERIALS"));
        assert!(report.contains("Drawing: P-042 - Cooling Water Supply"));
        assert!(report.contains("Scale: 1:50 | Revision: N/A"));
        assert!(report.contains("\nPIPES\n"));
        assert!(report.contains("Line: CW-4-CS-101"));
        assert!(report.contains("  Size: 4\" Sch 40"));
        assert!(report.contains("  Length: 125.5 ft"));
        assert!(report.contains("  Confidence: 95%"));
        assert!(report.contains("2× Gate Valve"));
        assert!(report.contains("  Size: 4\" Class 150"));
        assert!(report.contains("  Operator: Manual"));
        assert!(report.contains("  Material: N/A"));
        assert!(report.contains("Overall Confidence: 92%"));
        assert!(report.contains("  • Scale bar partly obscured"));
        assert!(report.ends_with(&format!("{}\n", "=".repeat(80))));
    }

    #[test]
    fn empty_sections_are_omitted() {
        let report = render_report(&sample());
        assert!(!report.contains("FITTINGS"));
        assert!(!report.contains("FLANGES"));

        let bare = render_report(&ExtractionResult::default());
        assert!(!bare.contains("PIPES"));
        assert!(!bare.contains("Drawing:"));
        assert!(!bare.contains("Notes:"));
        assert!(bare.contains("Overall Confidence: 0%"));
    }

    #[test]
    fn absent_item_fields_render_placeholder() {
        let result = ExtractionResult {
            pipes: vec![PipeSpec::default()],
            fittings: vec![FittingSpec::default()],
            flanges: vec![FlangeSpec::default()],
            ..Default::default()
        };
        let report = render_report(&result);
        assert!(report.contains("Line: N/A"));
        assert!(report.contains("  Size: N/A N/A"));
        assert!(report.contains("  Length: N/A ft"));
        assert!(report.contains("  Confidence: 0%"));
        assert!(report.contains("N/A× N/A"));
        assert!(report.contains("Items below 70% confidence: 3"));
    }

    #[test]
    fn whole_lengths_keep_one_decimal() {
        assert_eq!(length(Some(120.0)), "120.0");
        assert_eq!(length(Some(7.25)), "7.25");
        assert_eq!(length(None), "N/A");
    }

    #[test]
    fn integer_length_in_reply_prints_with_one_decimal() {
        let value = serde_json::json!({"pipes": [{"line_number": "CW-1", "length_ft": 120}]});
        let result = ExtractionResult::from_value(&value, "").unwrap();
        let report = render_report(&result);
        assert!(report.contains("  Length: 120.0 ft"), "{report}");
    }

    #[test]
    fn percent_rounds() {
        assert_eq!(percent(Some(0.8)), "80%");
        assert_eq!(percent(Some(0.926)), "93%");
        assert_eq!(percent(Some(1.0)), "100%");
        assert_eq!(percent(None), "0%");
    }
}
