//! Integration tests for graph construction and reachability
//!
//! Covers idempotent builds, resolution across file kinds and the
//! edge-based reachability policy.

use repohygiene::analysis::{CandidateTier, ReachabilityAnalyzer};
use repohygiene::config::Config;
use repohygiene::discovery::{FileFinder, FileRecord};
use repohygiene::graph::{GraphBuilder, GraphSnapshot, UsageGraph};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn scan(root: &Path, config: &Config) -> Vec<FileRecord> {
    FileFinder::new(config).scan(root).files
}

fn build(root: &Path, config: &Config) -> (Vec<FileRecord>, UsageGraph) {
    let files = scan(root, config);
    let graph = GraphBuilder::new(root, config).build(&files).graph;
    (files, graph)
}

fn sample_app(root: &Path) {
    write(
        root,
        "src/app/page.tsx",
        "import { Button } from '../components/Button';\nimport './globals.css';\n",
    );
    write(
        root,
        "src/components/Button.tsx",
        "import styles from './Button.module.css';\nexport const Button = () => null;\n",
    );
    write(root, "src/components/Button.module.css", ".btn { color: red; }\n");
    write(root, "src/app/globals.css", "@import '../styles/reset.css';\n");
    write(root, "src/styles/reset.css", "* { margin: 0; }\n");
    write(root, "src/lib/lazy.ts", "export default 1;\n");
    write(
        root,
        "src/lib/loader.ts",
        "export const load = () => import('./lazy');\n",
    );
    write(root, "src/lib/unused.ts", "export const nobody = true;\n");
    write(root, "src/__mocks__/api.mock.ts", "export {};\n");
}

// ============================================================================
// Graph construction
// ============================================================================

mod build_tests {
    use super::*;

    #[test]
    fn test_idempotent_graph_build() {
        let dir = TempDir::new().unwrap();
        sample_app(dir.path());
        let config = Config::default();

        let (_, first) = build(dir.path(), &config);
        let (_, second) = build(dir.path(), &config);
        assert_eq!(first.edge_set(), second.edge_set());
        assert!(first.edge_count() > 0);
    }

    #[test]
    fn test_parallel_and_sequential_builds_agree() {
        let dir = TempDir::new().unwrap();
        sample_app(dir.path());
        let config = Config::default();
        let files = scan(dir.path(), &config);

        let parallel = GraphBuilder::new(dir.path(), &config).build(&files).graph;
        let sequential = GraphBuilder::new(dir.path(), &config)
            .with_parallel(false)
            .build(&files)
            .graph;
        assert_eq!(parallel.edge_set(), sequential.edge_set());
    }

    #[test]
    fn test_script_and_style_edges() {
        let dir = TempDir::new().unwrap();
        sample_app(dir.path());
        let (_, graph) = build(dir.path(), &Config::default());
        let edges = graph.edge_set();

        let has = |from: &str, to: &str| edges.contains(&(from.to_string(), to.to_string()));
        assert!(has("src/app/page.tsx", "src/components/Button.tsx"));
        assert!(has("src/app/page.tsx", "src/app/globals.css"));
        assert!(has("src/components/Button.tsx", "src/components/Button.module.css"));
        assert!(has("src/app/globals.css", "src/styles/reset.css"));
        assert!(has("src/lib/loader.ts", "src/lib/lazy.ts"));
    }

    #[test]
    fn test_alias_resolution_from_config() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/app/page.tsx", "import { x } from '@/lib/x';\n");
        write(dir.path(), "src/lib/x.ts", "export const x = 1;\n");

        let mut config = Config::default();
        config.aliases.insert("@/".to_string(), "src/".to_string());
        let (_, graph) = build(dir.path(), &config);
        assert!(graph.is_edge_target("src/lib/x.ts"));
    }

    #[test]
    fn test_snapshot_written_per_round() {
        let dir = TempDir::new().unwrap();
        sample_app(dir.path());
        let (_, graph) = build(dir.path(), &Config::default());

        let path = dir.path().join("out").join(GraphSnapshot::file_name(1));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        graph.snapshot(1).write(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["round"], 1);
        assert_eq!(json["edgeCount"], graph.edge_count());
        assert!(json["nodes"].as_array().unwrap().len() >= 9);
    }
}

// ============================================================================
// Reachability
// ============================================================================

mod reachability_tests {
    use super::*;

    #[test]
    fn test_candidates_and_tiers() {
        let dir = TempDir::new().unwrap();
        sample_app(dir.path());
        let config = Config::default();
        let (files, graph) = build(dir.path(), &config);

        let analyzer = ReachabilityAnalyzer::from_config(&config).unwrap();
        let partition = analyzer.analyze(&files, &graph, 1);

        let mut paths = partition.candidate_paths();
        paths.sort();
        assert_eq!(
            paths,
            vec!["src/__mocks__/api.mock.ts", "src/lib/loader.ts", "src/lib/unused.ts"]
        );

        let mock = partition
            .candidates
            .iter()
            .find(|c| c.path.ends_with("api.mock.ts"))
            .unwrap();
        assert_eq!(mock.tier, CandidateTier::LikelyJunk);
        assert_eq!(partition.count_by_tier(CandidateTier::LikelyJunk), 1);
    }

    #[test]
    fn test_protected_files_never_become_candidates() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/app/layout.tsx", "");
        write(dir.path(), "src/middleware.ts", "");
        write(dir.path(), "public/logo.svg", "<svg/>");
        write(dir.path(), ".env.local", "SECRET=1");
        write(dir.path(), "migrations/001_init.sql", "create table x();");
        write(dir.path(), "next.config.js", "module.exports = {};");
        write(dir.path(), "orphan.ts", "");

        let mut config = Config::default();
        config.protected.push("scripts/**".to_string());
        write(dir.path(), "scripts/seed.ts", "");

        let (files, graph) = build(dir.path(), &config);
        let partition = ReachabilityAnalyzer::from_config(&config)
            .unwrap()
            .analyze(&files, &graph, 1);

        assert_eq!(partition.candidate_paths(), vec!["orphan.ts"]);
        assert!(partition.candidates.iter().all(|c| !c.protected_match));
    }

    #[test]
    fn test_mutually_importing_orphans_are_kept() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "x.ts", "import './y';\n");
        write(dir.path(), "y.ts", "import './x';\n");

        let config = Config::default();
        let (files, graph) = build(dir.path(), &config);
        let partition = ReachabilityAnalyzer::from_config(&config)
            .unwrap()
            .analyze(&files, &graph, 1);
        assert!(partition.candidates.is_empty());
    }

    #[test]
    fn test_bare_specifiers_do_not_protect_local_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/app/page.tsx", "import utils from 'utils';\n");
        write(dir.path(), "utils.ts", "export default {};\n");

        let config = Config::default();
        let (files, graph) = build(dir.path(), &config);
        let partition = ReachabilityAnalyzer::from_config(&config)
            .unwrap()
            .analyze(&files, &graph, 1);
        assert_eq!(partition.candidate_paths(), vec!["utils.ts"]);
    }
}
