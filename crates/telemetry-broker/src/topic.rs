//! Topic formatting (spec §4.8, bit-exact): `m/<division>/<plant>/<area>/
//! <subarea>/line/<line>/<scope_slug>`, every hierarchy name space-stripped.

use telemetry_store::Hierarchy;

fn strip_spaces(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

pub fn topic_for(hierarchy: &Hierarchy, scope_slug: &str) -> String {
    format!(
        "m/{}/{}/{}/{}/line/{}/{}",
        strip_spaces(&hierarchy.division),
        strip_spaces(&hierarchy.plant),
        strip_spaces(&hierarchy.area),
        strip_spaces(&hierarchy.subarea),
        strip_spaces(&hierarchy.line),
        strip_spaces(scope_slug),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_strips_internal_and_trailing_spaces() {
        let h = Hierarchy {
            division: "North America".into(),
            plant: "Plant 12".into(),
            area: "Body Shop".into(),
            subarea: "Under body".into(),
            line: "L 1".into(),
            station: "ST 10".into(),
        };
        assert_eq!(
            topic_for(&h, "HourlyProduction"),
            "m/NorthAmerica/Plant12/BodyShop/Underbody/line/L1/HourlyProduction"
        );
    }
}
