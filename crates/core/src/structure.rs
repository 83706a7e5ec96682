use std::collections::BTreeMap;

use crate::config::StructureConfig;
use crate::model::{location_depth, FolderConcern, StructureAnalysis};

/// Depth and fan-out statistics over the distinct locations that hold entries.
pub fn analyze_structure<'a, I>(locations: I, config: &StructureConfig) -> StructureAnalysis
where
    I: IntoIterator<Item = &'a str>,
{
    let mut per_location: BTreeMap<&'a str, u64> = BTreeMap::new();
    for location in locations {
        *per_location.entry(location).or_default() += 1;
    }

    if per_location.is_empty() {
        return StructureAnalysis::default();
    }

    let mut analysis = StructureAnalysis {
        node_count: per_location.len() as u64,
        ..StructureAnalysis::default()
    };
    let mut depth_sum = 0_u64;
    let mut entry_sum = 0_u64;

    for (location, entries) in &per_location {
        let depth = location_depth(location);
        depth_sum += depth as u64;
        entry_sum += entries;
        analysis.max_depth = analysis.max_depth.max(depth);
        analysis.max_entries_per_folder = analysis.max_entries_per_folder.max(*entries);
        *analysis.depth_histogram.entry(depth).or_default() += 1;

        let concern = || FolderConcern {
            location: location.to_string(),
            depth,
            entries: *entries,
        };
        if depth >= config.deep_folder_depth {
            analysis.deep_folders.push(concern());
        }
        if depth <= config.crowded_max_depth && *entries > config.crowded_folder_entries {
            analysis.shallow_crowded_folders.push(concern());
        }
    }

    analysis.avg_depth = depth_sum as f64 / analysis.node_count as f64;
    analysis.avg_entries_per_folder = entry_sum as f64 / analysis.node_count as f64;
    analysis
        .shallow_crowded_folders
        .sort_by(|a, b| b.entries.cmp(&a.entries).then_with(|| a.location.cmp(&b.location)));
    analysis
}

#[cfg(test)]
mod tests {
    use super::analyze_structure;
    use crate::config::StructureConfig;

    #[test]
    fn empty_input_yields_empty_analysis() {
        let analysis = analyze_structure(Vec::<&str>::new(), &StructureConfig::default());
        assert_eq!(analysis.node_count, 0);
        assert_eq!(analysis.max_depth, 0);
        assert_eq!(analysis.avg_depth, 0.0);
        assert!(analysis.depth_histogram.is_empty());
    }

    #[test]
    fn histogram_sums_to_node_count() {
        let locations = ["", "", "a", "a/b", "a/b/c", "x/y"];
        let analysis = analyze_structure(locations, &StructureConfig::default());
        assert_eq!(analysis.node_count, 5);
        assert_eq!(analysis.depth_histogram.values().sum::<u64>(), analysis.node_count);
        assert_eq!(analysis.max_depth, 3);
        assert!((analysis.avg_depth - (0.0 + 1.0 + 2.0 + 3.0 + 2.0) / 5.0).abs() < 1e-9);
        assert_eq!(analysis.max_entries_per_folder, 2);
    }

    #[test]
    fn deep_and_crowded_folders_are_flagged() {
        let mut locations = vec!["a/b/c/d/e/f", "a/b/c/d/e"];
        locations.extend(std::iter::repeat("inbox").take(21));
        locations.extend(std::iter::repeat("").take(20));
        locations.extend(std::iter::repeat("a/b").take(30));

        let analysis = analyze_structure(locations, &StructureConfig::default());
        assert_eq!(analysis.deep_folders.len(), 1);
        assert_eq!(analysis.deep_folders[0].location, "a/b/c/d/e/f");
        assert_eq!(analysis.deep_folders[0].depth, 6);
        assert_eq!(analysis.shallow_crowded_folders.len(), 1);
        assert_eq!(analysis.shallow_crowded_folders[0].location, "inbox");
        assert_eq!(analysis.shallow_crowded_folders[0].entries, 21);
    }
}
