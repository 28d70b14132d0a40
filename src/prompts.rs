//! The extraction prompt sent alongside the drawing image.
//!
//! The prompt is the whole contract with the model: it names the five
//! categories, pins the exact JSON shape [`crate::model::ExtractionResult`]
//! decodes, and sets the confidence banding policy. Keeping it in one place
//! lets the tests below catch accidental edits to the schema.
//!
//! Callers can override it via [`crate::config::ExtractionConfig::prompt`];
//! the constant is used only when no override is provided.

/// Default prompt for extracting a bill of materials from an isometric drawing.
pub const EXTRACTION_PROMPT: &str = r#"You are analyzing an isometric piping drawing to extract specifications for cost estimation.

Extract ALL of the following:

1. **Drawing Info:**
   - Drawing number
   - Title
   - Scale
   - Revision

2. **Pipes:**
   - Line number (e.g., "CW-4-CS-101")
   - Size (NPS in inches, e.g., "4"")
   - Schedule (e.g., "Sch 40")
   - Material (e.g., "Carbon Steel A106-B")
   - Service (e.g., "Cooling Water")
   - Approximate length in feet (use scale if visible)

3. **Fittings:**
   - Type (90° elbow, tee, reducer, etc.)
   - Size
   - Material
   - Quantity

4. **Valves:**
   - Type (gate, globe, ball, check, etc.)
   - Size
   - Pressure class
   - Operator (manual, electric, pneumatic)
   - Material
   - Quantity

5. **Flanges:**
   - Type (WN, SO, blind, etc.)
   - Size
   - Pressure class
   - Material
   - Quantity

Return ONLY valid JSON with this structure:
```json
{
  "drawing": {
    "number": "P-042",
    "title": "Cooling Water Supply",
    "scale": "1:50",
    "revision": "A"
  },
  "pipes": [
    {
      "line_number": "CW-4-CS-101",
      "size": "4\"",
      "schedule": "Sch 40",
      "material": "Carbon Steel",
      "service": "Cooling Water",
      "length_ft": 125.5,
      "confidence": 0.95
    }
  ],
  "fittings": [
    {
      "type": "90° Elbow",
      "size": "4\"",
      "material": "Carbon Steel",
      "quantity": 8,
      "confidence": 0.92
    }
  ],
  "valves": [
    {
      "type": "Gate Valve",
      "size": "4\"",
      "pressure_class": "Class 150",
      "operator": "Manual",
      "material": "Carbon Steel",
      "quantity": 2,
      "confidence": 0.91
    }
  ],
  "flanges": [
    {
      "type": "Weld Neck",
      "size": "4\"",
      "pressure_class": "Class 150",
      "material": "Carbon Steel",
      "quantity": 4,
      "confidence": 0.89
    }
  ],
  "overall_confidence": 0.92,
  "notes": ["Any observations or uncertainties"]
}
```

**Important:**
- Set confidence >0.90 for clear, unambiguous specs
- Set confidence 0.70-0.90 for readable but uncertain items
- Set confidence <0.70 for unclear or estimated items
- Use null for missing information
- Include notes for anything unclear"#;
