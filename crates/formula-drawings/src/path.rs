/// Part name of the `.rels` part holding the relationships of `part`.
pub fn rels_for_part(part: &str) -> String {
    let part = part.strip_prefix('/').unwrap_or(part);
    match part.rsplit_once('/') {
        Some((dir, file_name)) => format!("{dir}/_rels/{file_name}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship target against the part that owns the relationship.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    // Relationship targets are URIs; some producers include a URI fragment (e.g. `../media/img.png#id`).
    // OPC part names do not include fragments, so strip them before resolving.
    let target = target.split('#').next().unwrap_or(target);
    if target.is_empty() {
        // A target of just `#fragment` refers to the source part itself.
        return normalize(source_part);
    }
    if let Some(target) = target.strip_prefix('/') {
        return normalize(target);
    }

    let source_part = source_part.strip_prefix('/').unwrap_or(source_part);
    let base_dir = source_part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    normalize(&format!("{base_dir}/{target}"))
}

/// Inverse of [`resolve_target`]: the relative target that `source_part` should use to reference
/// `target_part`.
pub fn relative_target(source_part: &str, target_part: &str) -> String {
    let source = normalize(source_part);
    let target = normalize(target_part);

    let source_dir: Vec<&str> = match source.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let target_segments: Vec<&str> = target.split('/').collect();

    let common = source_dir
        .iter()
        .zip(target_segments.iter())
        .take_while(|(a, b)| a == b)
        .count();
    // Never consume the file name segment of the target.
    let common = common.min(target_segments.len().saturating_sub(1));

    let mut out: Vec<&str> = Vec::new();
    for _ in common..source_dir.len() {
        out.push("..");
    }
    out.extend(&target_segments[common..]);
    out.join("/")
}

pub(crate) fn normalize(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rels_for_part_in_root() {
        assert_eq!(rels_for_part("workbook.xml"), "_rels/workbook.xml.rels");
    }

    #[test]
    fn rels_for_part_in_subdir() {
        assert_eq!(
            rels_for_part("xl/drawings/drawing1.xml"),
            "xl/drawings/_rels/drawing1.xml.rels"
        );
        assert_eq!(
            rels_for_part("/xl/worksheets/sheet1.xml"),
            "xl/worksheets/_rels/sheet1.xml.rels"
        );
    }

    #[test]
    fn resolve_target_relative_to_source_dir() {
        assert_eq!(
            resolve_target("xl/worksheets/sheet1.xml", "../drawings/drawing1.xml"),
            "xl/drawings/drawing1.xml"
        );
    }

    #[test]
    fn resolve_target_strips_fragments() {
        assert_eq!(
            resolve_target("xl/drawings/drawing1.xml", "../media/image1.png#frag"),
            "xl/media/image1.png"
        );
    }

    #[test]
    fn resolve_target_absolute_paths_are_normalized() {
        assert_eq!(
            resolve_target("xl/workbook.xml", "/xl/../docProps/core.xml"),
            "docProps/core.xml"
        );
    }

    #[test]
    fn relative_target_walks_up_to_common_ancestor() {
        assert_eq!(
            relative_target("xl/worksheets/sheet1.xml", "xl/drawings/drawing1.xml"),
            "../drawings/drawing1.xml"
        );
        assert_eq!(
            relative_target("xl/drawings/drawing1.xml", "xl/charts/chart3.xml"),
            "../charts/chart3.xml"
        );
        assert_eq!(
            relative_target("xl/charts/chart1.xml", "xl/charts/style1.xml"),
            "style1.xml"
        );
        assert_eq!(relative_target("_rels/.rels", "chart/chart.xml"), "../chart/chart.xml");
    }

    #[test]
    fn relative_target_round_trips_through_resolve() {
        let source = "xl/chartsheets/sheet2.xml";
        let target = "xl/drawings/drawing7.xml";
        assert_eq!(resolve_target(source, &relative_target(source, target)), target);
    }
}
