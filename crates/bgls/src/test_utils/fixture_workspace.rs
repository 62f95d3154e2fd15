//! Deterministic fixture workspace generator for benchmarks and tests.
//!
//! Generates synthetic BuildGraph workspaces with controlled characteristics:
//! file count, macros and nodes per file, and the depth of the `<Include>`
//! chain. Output is deterministic so benchmarks are reproducible.

use std::fmt::Write;
use std::path::Path;
use tempfile::TempDir;

/// Configuration for generating a fixture workspace.
#[derive(Debug, Clone)]
pub struct FixtureConfig {
    pub file_count: usize,
    pub macros_per_file: usize,
    pub nodes_per_file: usize,
    /// `Script_0.xml` includes `Script_1.xml` and so on, this many links deep
    pub include_chain_depth: usize,
}

impl FixtureConfig {
    /// 10 files, chain depth 3
    pub fn small() -> Self {
        Self {
            file_count: 10,
            macros_per_file: 2,
            nodes_per_file: 5,
            include_chain_depth: 3,
        }
    }

    /// 50 files, chain depth 10
    pub fn medium() -> Self {
        Self {
            file_count: 50,
            macros_per_file: 4,
            nodes_per_file: 10,
            include_chain_depth: 10,
        }
    }

    /// 200 files, chain depth 50
    pub fn large() -> Self {
        Self {
            file_count: 200,
            macros_per_file: 8,
            nodes_per_file: 20,
            include_chain_depth: 50,
        }
    }

    /// Name of the macro the root script expands from the far end of the chain.
    pub fn deepest_macro(&self) -> String {
        let last = self.include_chain_depth.min(self.file_count.saturating_sub(1));
        format!("Macro_{}_0", last)
    }
}

pub fn script_name(index: usize) -> String {
    format!("Script_{}.xml", index)
}

/// Generate the text of script `index`.
///
/// Every script declares properties, macros, and an agent of nodes whose
/// produced tags are required by the following node. Scripts on the include
/// chain include the next script and expand a macro declared there.
pub fn generate_script(index: usize, config: &FixtureConfig) -> String {
    let mut out = String::new();
    let on_chain = index < config.include_chain_depth && index + 1 < config.file_count;

    writeln!(out, "<?xml version='1.0' ?>").unwrap();
    writeln!(out, "<BuildGraph xmlns=\"http://www.epicgames.com/BuildGraph\">").unwrap();
    if on_chain {
        writeln!(out, "  <Include Script=\"{}\"/>", script_name(index + 1)).unwrap();
    }
    writeln!(out).unwrap();

    writeln!(out, "  <Option Name=\"Enable_{}\" DefaultValue=\"true\" Description=\"Toggle\"/>", index).unwrap();
    writeln!(out, "  <Property Name=\"Out_{}\" Value=\"$(RootDir)/Out/{}\"/>", index, index).unwrap();
    writeln!(out).unwrap();

    for m in 0..config.macros_per_file {
        writeln!(out, "  <Macro Name=\"Macro_{}_{}\" Arguments=\"Files\">", index, m).unwrap();
        writeln!(out, "    <!-- <Log Message=\"disabled $(Files)\"/> -->").unwrap();
        writeln!(out, "    <Log Message=\"$(Files) into $(Out_{})\"/>", index).unwrap();
        writeln!(out, "  </Macro>").unwrap();
    }
    writeln!(out).unwrap();

    writeln!(out, "  <Agent Name=\"Agent_{}\" Type=\"Win64\">", index).unwrap();
    for n in 0..config.nodes_per_file {
        let requires = if n == 0 {
            String::new()
        } else {
            format!(" Requires=\"#Tag_{}_{}\"", index, n - 1)
        };
        writeln!(
            out,
            "    <Node Name=\"Node_{}_{}\" Produces=\"#Tag_{}_{}\"{}>",
            index, n, index, n, requires
        )
        .unwrap();
        if on_chain {
            writeln!(out, "      <Expand Name=\"Macro_{}_0\" Files=\"#Tag_{}_{}\"/>", index + 1, index, n).unwrap();
        }
        writeln!(out, "      <Tag Files=\"$(Out_{})/...\" With=\"#Tag_{}_{}\"/>", index, index, n).unwrap();
        writeln!(out, "    </Node>").unwrap();
    }
    writeln!(out, "  </Agent>").unwrap();
    writeln!(out).unwrap();

    if config.nodes_per_file > 0 {
        writeln!(
            out,
            "  <Aggregate Name=\"All_{}\" Requires=\"#Tag_{}_{}\"/>",
            index,
            index,
            config.nodes_per_file - 1
        )
        .unwrap();
    }
    writeln!(out, "</BuildGraph>").unwrap();

    out
}

/// Create a temporary fixture workspace. Dropping the `TempDir` removes it.
pub fn create_fixture_workspace(config: &FixtureConfig) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory for fixture workspace");
    write_fixture_workspace(temp_dir.path(), config);
    temp_dir
}

/// Write fixture scripts into an existing directory.
pub fn write_fixture_workspace(dir: &Path, config: &FixtureConfig) {
    for i in 0..config.file_count {
        let filename = script_name(i);
        std::fs::write(dir.join(&filename), generate_script(i, config))
            .unwrap_or_else(|e| panic!("Failed to write fixture file {}: {}", filename, e));
    }
}
