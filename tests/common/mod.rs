use czone_hhi::core::parser::ColumnSpec;

/// One extract line with `fields` placed at their layout offsets.
pub fn dnb_line(fields: &[(&str, &str)]) -> String {
    let spec = ColumnSpec::dnb();
    let mut line = vec![b' '; spec.record_width()];
    for (name, value) in fields {
        let column = spec
            .columns()
            .iter()
            .find(|c| c.name == *name)
            .unwrap_or_else(|| panic!("no column {}", name));
        let width = column.end - column.start + 1;
        let bytes = &value.as_bytes()[..value.len().min(width)];
        line[column.start - 1..column.start - 1 + bytes.len()].copy_from_slice(bytes);
    }
    String::from_utf8(line).unwrap()
}

pub fn business_line(duns: &str, street: &str, zip: &str, sic: &str, employees: &str, sales: &str) -> String {
    dnb_line(&[
        ("DUNS", duns),
        ("DCOMP", "ACME CORP"),
        ("DSTREET", street),
        ("DCITY", "LOS ANGELES"),
        ("DSTATEAB", "CA"),
        ("DZIP5", zip),
        ("DPRIMSI", sic),
        ("DEMTLHER", employees),
        ("DSALESVO", sales),
    ])
}

/// Census-style response placing the address in one county.
pub fn county_response(state: &str, county: &str) -> serde_json::Value {
    serde_json::json!({
        "result": {
            "input": {"benchmark": {"benchmarkName": "Public_AR_Current"}},
            "addressMatches": [{
                "matchedAddress": "100 MAIN ST, LOS ANGELES, CA, 90012",
                "coordinates": {"x": -118.24, "y": 34.05},
                "geographies": {
                    "Census Tracts": [{"STATE": state, "COUNTY": county, "TRACT": "207400"}],
                    "Counties": [{"STATE": state, "COUNTY": county, "NAME": "Los Angeles County"}]
                }
            }]
        }
    })
}
