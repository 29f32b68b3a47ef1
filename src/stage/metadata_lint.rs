use std::path::PathBuf;

use serde_yaml::Value;

use crate::config::BakeConfig;
use crate::errors::StageError;
use crate::layout::BuildLayout;

use super::command::{render, run_shell};
use super::metadata::{FamilyMetadata, UNKNOWN_FAMILY};
use super::{PassMode, Stage, StageContext, configured_command};

pub const KNOWN_LICENSES: [&str; 3] = ["OFL", "Apache2", "UFL"];

pub const SUPPORTED_SUBSETS: [&str; 14] = [
    "arabic",
    "cyrillic",
    "cyrillic-ext",
    "devanagari",
    "greek",
    "greek-ext",
    "hebrew",
    "khmer",
    "latin",
    "latin-ext",
    "menu",
    "tamil",
    "thai",
    "vietnamese",
];

/// Checks the generated metadata file.
///
/// Problems are collected under `metadata_lint` and never stop the build;
/// only a missing or unreadable metadata file does.
pub struct MetadataLintStage {
    build_dir: PathBuf,
    project_dir: PathBuf,
}

impl MetadataLintStage {
    pub fn new(layout: &BuildLayout) -> Self {
        Self {
            build_dir: layout.build_dir().to_path_buf(),
            project_dir: layout.project_root().to_path_buf(),
        }
    }

    fn check(&self, metadata: &FamilyMetadata) -> Vec<String> {
        let mut problems = Vec::new();

        if metadata.name.is_empty() || metadata.name == UNKNOWN_FAMILY {
            problems.push("family name is not set".to_string());
        }
        if !KNOWN_LICENSES.contains(&metadata.license.as_str()) {
            problems.push(format!("unknown license '{}'", metadata.license));
        }
        if metadata.fonts.is_empty() {
            problems.push("no fonts listed".to_string());
        }

        for font in &metadata.fonts {
            if !(100..=900).contains(&font.weight) || font.weight % 100 != 0 {
                problems.push(format!("{}: invalid weight {}", font.filename, font.weight));
            }
            if font.style != "normal" && font.style != "italic" {
                problems.push(format!("{}: invalid style '{}'", font.filename, font.style));
            }
            if !self.build_dir.join(&font.filename).is_file() {
                problems.push(format!("{}: file not found", font.filename));
            }
        }

        let regular = metadata
            .fonts
            .iter()
            .filter(|f| f.style == "normal" && f.weight == 400)
            .count();
        if !metadata.fonts.is_empty() && regular != 1 {
            problems.push(format!("expected one regular face, found {}", regular));
        }

        for subset in &metadata.subsets {
            if !SUPPORTED_SUBSETS.contains(&subset.as_str()) {
                problems.push(format!("unsupported subset '{}'", subset));
            }
        }

        problems
    }
}

impl Stage for MetadataLintStage {
    fn name(&self) -> &'static str {
        "metadata-lint"
    }

    fn execute(
        &mut self,
        mode: PassMode,
        ctx: &mut StageContext<'_>,
        config: &mut BakeConfig,
    ) -> Result<(), StageError> {
        let command = configured_command(config, "metadata_lint_command");

        ctx.task("Lint METADATA.json");
        if command.is_some() {
            ctx.task("Run metadata lint command");
        }
        if mode.is_counting() {
            return Ok(());
        }

        let file = config
            .get_str("metadata_file")
            .map(str::to_string)
            .ok_or_else(|| StageError::InvalidConfig {
                key: "metadata_file".to_string(),
                message: "no metadata was generated".to_string(),
            })?;
        let path = self.build_dir.join(&file);
        let metadata = FamilyMetadata::load(&path)?;

        let mut problems = self.check(&metadata);
        for problem in &problems {
            ctx.raw(&format!("{}: {}", file, problem));
        }

        if let Some(template) = command {
            let file_arg = path.to_string_lossy().into_owned();
            let build_dir = self.build_dir.to_string_lossy().into_owned();
            let project_dir = self.project_dir.to_string_lossy().into_owned();
            let line = render(
                &template,
                &[
                    ("file", file_arg.as_str()),
                    ("output", file_arg.as_str()),
                    ("build_dir", build_dir.as_str()),
                    ("project_dir", project_dir.as_str()),
                ],
            );
            let output = run_shell(ctx, &line)?;
            if !output.success() {
                problems.push(format!("'{}' exited with {}", output.command, output.code));
            }
        }

        let recorded: Vec<Value> = problems.into_iter().map(Value::from).collect();
        config.set("metadata_lint", recorded);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageKind;
    use crate::stage::test_support::Harness;

    fn config_with(yaml: &str) -> BakeConfig {
        BakeConfig::from_yaml("test", yaml.as_bytes()).unwrap()
    }

    const GOOD: &[u8] = br#"{
        "name": "Lobster",
        "designer": "Pablo Impallari",
        "license": "OFL",
        "visibility": "Sandbox",
        "category": "",
        "fonts": [{
            "name": "Lobster",
            "postScriptName": "Lobster-Regular",
            "fullName": "Lobster Regular",
            "style": "normal",
            "weight": 400,
            "filename": "Lobster-Regular.ttf"
        }],
        "subsets": ["latin"],
        "dateAdded": "2026-01-01"
    }"#;

    #[test]
    fn test_counting_reports_tasks() {
        let mut h = Harness::new();
        let mut config = config_with("metadata_lint_command: 'true'\n");
        let mut stage = MetadataLintStage::new(&h.layout);
        h.run(&mut stage, PassMode::Counting, &mut config).unwrap();
        assert_eq!(h.progress.total(), 2);
    }

    #[test]
    fn test_clean_metadata_has_no_problems() {
        let mut h = Harness::new();
        h.write_build_file("METADATA.json", GOOD);
        h.write_build_file("Lobster-Regular.ttf", b"ttf");
        let mut config = config_with("metadata_file: METADATA.json\n");
        h.run_both(StageKind::MetadataLint, &mut config).unwrap();
        assert!(config.get_str_list("metadata_lint").is_empty());
    }

    #[test]
    fn test_problems_are_recorded_not_fatal() {
        let mut h = Harness::new();
        h.write_build_file(
            "METADATA.json",
            br#"{"name": "UNKNOWN", "license": "GPL", "fonts": [{
                "name": "X", "postScriptName": "X-Bold", "fullName": "X Bold",
                "style": "oblique", "weight": 750, "filename": "X-Bold.ttf"
            }], "subsets": ["klingon"]}"#,
        );
        let mut config = config_with("metadata_file: METADATA.json\n");
        h.run_both(StageKind::MetadataLint, &mut config).unwrap();

        let problems = config.get_str_list("metadata_lint");
        let joined = problems.join("\n");
        assert!(joined.contains("family name is not set"));
        assert!(joined.contains("unknown license 'GPL'"));
        assert!(joined.contains("invalid weight 750"));
        assert!(joined.contains("invalid style 'oblique'"));
        assert!(joined.contains("X-Bold.ttf: file not found"));
        assert!(joined.contains("expected one regular face, found 0"));
        assert!(joined.contains("unsupported subset 'klingon'"));
    }

    #[test]
    fn test_missing_metadata_file_key_is_an_error() {
        let mut h = Harness::new();
        let mut config = BakeConfig::new();
        let err = h
            .run_both(StageKind::MetadataLint, &mut config)
            .unwrap_err();
        assert!(matches!(err, StageError::InvalidConfig { ref key, .. } if key == "metadata_file"));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_lint_command_is_recorded() {
        let mut h = Harness::new();
        h.write_build_file("METADATA.json", GOOD);
        h.write_build_file("Lobster-Regular.ttf", b"ttf");
        let mut config =
            config_with("metadata_file: METADATA.json\nmetadata_lint_command: 'exit 2'\n");
        h.run_both(StageKind::MetadataLint, &mut config).unwrap();

        let problems = config.get_str_list("metadata_lint");
        assert_eq!(problems, vec!["'exit 2' exited with 2"]);
        assert_eq!(h.progress.completed(), 3);
    }
}
