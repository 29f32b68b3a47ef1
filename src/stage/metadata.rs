//! `METADATA.json` generation.
//!
//! Font facts come from each binary's own tables: names from `name`, weight
//! and regular-ness from `OS/2`, style from `post.italicAngle` and the
//! monospace category from the advance widths of every mapped glyph. Binaries
//! that do not parse are described from their file names
//! (`Family-StyleName.ttf`) instead.
//!
//! Values already present in an existing `METADATA.json` win over inferred
//! ones; in that case the result is written next to it as
//! `METADATA.json.new` so the upstream file is never clobbered.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use ttf_parser::{Face, PlatformId, name_id};

use crate::config::BakeConfig;
use crate::errors::StageError;
use crate::layout::BuildLayout;

use super::{PassMode, Stage, StageContext};

pub const METADATA_JSON: &str = "METADATA.json";
pub const METADATA_JSON_NEW: &str = "METADATA.json.new";
pub const UNKNOWN_FAMILY: &str = "UNKNOWN";
pub const DEFAULT_COPYRIGHT: &str = "All rights reserved";
pub const MULTIPLE_DESIGNERS: &str = "Multiple Designers";

/// Family-level metadata. Unknown keys from an existing file are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub designer: String,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub visibility: String,
    /// `monospace` or empty. An existing value, even an empty one, is kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Gzipped size of the Regular binary in bytes, `-1` when unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(default)]
    pub fonts: Vec<FontMetadata>,
    #[serde(default)]
    pub subsets: Vec<String>,
    #[serde(default)]
    pub date_added: String,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontMetadata {
    pub name: String,
    pub post_script_name: String,
    pub full_name: String,
    pub style: String,
    pub weight: u32,
    pub filename: String,
    #[serde(default)]
    pub copyright: String,
}

impl FamilyMetadata {
    pub fn load(path: &Path) -> Result<Self, StageError> {
        let text = fs::read_to_string(path).map_err(|e| StageError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| StageError::Metadata {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// What one binary says about itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceInfo {
    pub family: Option<String>,
    pub subfamily: Option<String>,
    pub post_script_name: Option<String>,
    pub full_name: Option<String>,
    pub designer: Option<String>,
    pub copyright: Option<String>,
    pub weight: u32,
    pub italic: bool,
    /// Weight 400, neither bold nor italic.
    pub regular: bool,
    /// Distinct advance widths of the glyphs mapped by the Windows Unicode cmaps.
    pub advance_widths: BTreeSet<u16>,
}

impl FaceInfo {
    /// Read the `name`, `OS/2`, `post`, `cmap` and `hmtx` tables. `None` when
    /// `data` is not a font.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let face = Face::parse(data, 0).ok()?;
        let name = |id: u16| {
            face.names()
                .into_iter()
                .filter(|n| n.name_id == id)
                .find_map(|n| n.to_string())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let weight = face.weight().to_number();
        let italic = face
            .tables()
            .post
            .as_ref()
            .map(|post| post.italic_angle != 0.0)
            .unwrap_or(false);

        let mut advance_widths = BTreeSet::new();
        if let Some(cmap) = face.tables().cmap.as_ref() {
            for subtable in cmap.subtables {
                if subtable.platform_id != PlatformId::Windows
                    || !matches!(subtable.encoding_id, 1 | 10)
                {
                    continue;
                }
                subtable.codepoints(|codepoint| {
                    if let Some(glyph) = subtable.glyph_index(codepoint) {
                        advance_widths.insert(face.glyph_hor_advance(glyph).unwrap_or(0));
                    }
                });
            }
        }

        Some(Self {
            family: name(name_id::FAMILY),
            subfamily: name(name_id::SUBFAMILY),
            post_script_name: name(name_id::POST_SCRIPT_NAME),
            full_name: name(name_id::FULL_NAME),
            designer: name(name_id::DESIGNER),
            copyright: name(name_id::COPYRIGHT_NOTICE),
            weight: u32::from(weight),
            italic,
            regular: weight == 400 && !face.is_bold() && !face.is_italic(),
            advance_widths,
        })
    }

    /// Facts guessed from a `Family-Style.ext` file name.
    pub fn from_file_name(filename: &str) -> Self {
        let (family, style) = split_font_name(filename);
        Self {
            post_script_name: Some(format!("{}-{}", family, style)),
            weight: infer_weight(&style),
            italic: style.ends_with("Italic"),
            regular: style.eq_ignore_ascii_case("Regular"),
            family: Some(family),
            subfamily: Some(style),
            ..Self::default()
        }
    }

    /// The family name with the style words removed, e.g. `Lobster Bold` with
    /// subfamily `Bold` gives `Lobster`.
    pub fn family_name(&self) -> Option<String> {
        let family = self.family.as_deref()?;
        let stripped = match self.subfamily.as_deref() {
            Some(style) if !style.is_empty() => family.replace(style, ""),
            _ => family.to_string(),
        };
        let stripped = stripped.trim();
        Some(if stripped.is_empty() { family } else { stripped }.to_string())
    }
}

/// A binary listed under `binaries` together with what could be read from it.
struct InspectedFont {
    filename: String,
    info: FaceInfo,
    data: Option<Vec<u8>>,
}

/// Generates family metadata for the built binaries. One task.
pub struct MetadataStage {
    build_dir: PathBuf,
}

impl MetadataStage {
    pub fn new(layout: &BuildLayout) -> Self {
        Self {
            build_dir: layout.build_dir().to_path_buf(),
        }
    }

    fn metadata_path(&self) -> PathBuf {
        self.build_dir.join(METADATA_JSON)
    }

    /// An upstream `METADATA.json` only counts when it is not empty.
    fn has_metadata(&self) -> bool {
        fs::metadata(self.metadata_path())
            .map(|meta| meta.len() > 0)
            .unwrap_or(false)
    }

    fn existing(&self) -> Result<Option<FamilyMetadata>, StageError> {
        if self.has_metadata() {
            FamilyMetadata::load(&self.metadata_path()).map(Some)
        } else {
            Ok(None)
        }
    }

    fn inspect(&self, filename: &str) -> InspectedFont {
        let data = fs::read(self.build_dir.join(filename)).ok();
        let parsed = data.as_deref().and_then(FaceInfo::parse);
        let info = parsed.unwrap_or_else(|| {
            tracing::warn!(file = filename, "cannot read font tables, inferring from file name");
            FaceInfo::from_file_name(filename)
        });
        InspectedFont {
            filename: filename.to_string(),
            info,
            data,
        }
    }

    fn generate(
        &self,
        ctx: &mut StageContext<'_>,
        config: &BakeConfig,
    ) -> Result<FamilyMetadata, StageError> {
        let fonts: Vec<InspectedFont> = config
            .get_str_list("binaries")
            .iter()
            .map(|filename| self.inspect(filename))
            .collect();
        let regular = fonts.iter().find(|f| f.info.regular);
        let mut metadata = self.existing()?.unwrap_or_default();

        let configured = config
            .get_str("familyname")
            .map(str::trim)
            .filter(|name| !name.is_empty());
        if let Some(name) = configured {
            metadata.name = name.to_string();
        } else if metadata.name.is_empty() || metadata.name == UNKNOWN_FAMILY {
            metadata.name = regular
                .and_then(|f| f.info.family_name())
                .unwrap_or_else(|| {
                    ctx.raw("FATAL: No *-Regular font found to set family name!");
                    UNKNOWN_FAMILY.to_string()
                });
        }
        let family = metadata.name.clone();

        if metadata.designer.is_empty() {
            metadata.designer = config
                .get_str("designer")
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string)
                .or_else(|| regular.and_then(|f| f.info.designer.clone()))
                .unwrap_or_else(|| MULTIPLE_DESIGNERS.to_string());
        }

        if metadata.license.is_empty() {
            metadata.license = config
                .get_str("license_file")
                .map(|f| self.build_dir.join(f))
                .and_then(|p| fs::read_to_string(p).ok())
                .map(|text| infer_license(&text).to_string())
                .unwrap_or_default();
        }

        if metadata.visibility.is_empty() {
            metadata.visibility = "Sandbox".to_string();
        }

        if metadata.category.is_none() {
            let monospace = is_monospace(fonts.iter().map(|f| &f.info));
            metadata.category = Some(if monospace { "monospace" } else { "" }.to_string());
        }

        if matches!(metadata.size, None | Some(-1)) {
            let regular_data = regular.and_then(|f| f.data.as_deref().map(|data| (f, data)));
            metadata.size = Some(match regular_data {
                Some((font, data)) => {
                    let size = gzip_size(data)
                        .map_err(|e| StageError::io(self.build_dir.join(&font.filename), e))?;
                    i64::try_from(size).unwrap_or(i64::MAX)
                }
                None => {
                    ctx.raw("WARNING: No *-Regular font to calculate gzipped filesize!");
                    -1
                }
            });
        }

        let previous = std::mem::take(&mut metadata.fonts);
        metadata.fonts = fonts
            .iter()
            .map(|font| {
                let old = previous.iter().find(|f| f.filename == font.filename);
                font_metadata(&family, font, old)
            })
            .collect();
        metadata.fonts.sort_by_key(|f| f.weight);

        let mut subsets = config.get_str_list("subset");
        subsets.sort();
        subsets.dedup();
        metadata.subsets = if subsets.is_empty() {
            vec!["latin".to_string()]
        } else {
            subsets
        };

        if metadata.date_added.is_empty() {
            metadata.date_added = chrono::Local::now().format("%Y-%m-%d").to_string();
        }

        Ok(metadata)
    }
}

impl Stage for MetadataStage {
    fn name(&self) -> &'static str {
        "metadata"
    }

    fn execute(
        &mut self,
        mode: PassMode,
        ctx: &mut StageContext<'_>,
        config: &mut BakeConfig,
    ) -> Result<(), StageError> {
        let target = if self.has_metadata() {
            METADATA_JSON_NEW
        } else {
            METADATA_JSON
        };

        ctx.task(&format!("Generate {}", target));
        if mode.is_counting() {
            return Ok(());
        }

        let metadata = self.generate(ctx, config)?;
        let path = self.build_dir.join(target);
        let mut json = serde_json::to_string_pretty(&metadata).map_err(|e| StageError::Metadata {
            path: path.clone(),
            message: e.to_string(),
        })?;
        json.push('\n');
        fs::write(&path, json).map_err(|e| StageError::io(&path, e))?;

        config.set("metadata_file", target);
        Ok(())
    }
}

/// Monospace when every mapped glyph of every face has the same advance.
pub fn is_monospace<'a>(faces: impl IntoIterator<Item = &'a FaceInfo>) -> bool {
    let widths: BTreeSet<u16> = faces
        .into_iter()
        .flat_map(|face| face.advance_widths.iter().copied())
        .collect();
    widths.len() == 1
}

/// Length of `data` after gzip compression.
pub fn gzip_size(data: &[u8]) -> io::Result<u64> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?.len() as u64)
}

/// Split `Family-Style.ext` into `(family, style)`. No dash means Regular.
pub fn split_font_name(filename: &str) -> (String, String) {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    match stem.rsplit_once('-') {
        Some((family, style)) if !family.is_empty() && !style.is_empty() => {
            (family.to_string(), style.to_string())
        }
        _ => (stem, "Regular".to_string()),
    }
}

pub fn infer_license(text: &str) -> &'static str {
    if text.contains("Apache License") {
        "Apache2"
    } else if text.contains("SIL Open Font License, Version 1.1") {
        "OFL"
    } else if text.contains("UBUNTU FONT LICENCE Version 1.0") {
        "UFL"
    } else {
        ""
    }
}

/// OS/2 weight class for a style name such as `SemiBoldItalic`.
pub fn infer_weight(style: &str) -> u32 {
    let base = style.trim_end_matches("Italic").to_ascii_lowercase();
    match base.as_str() {
        "thin" | "hairline" => 100,
        "extralight" | "ultralight" => 200,
        "light" => 300,
        "medium" => 500,
        "semibold" | "demibold" => 600,
        "bold" => 700,
        "extrabold" | "ultrabold" => 800,
        "black" | "heavy" => 900,
        _ => 400,
    }
}

fn font_metadata(
    family: &str,
    font: &InspectedFont,
    previous: Option<&FontMetadata>,
) -> FontMetadata {
    let info = &font.info;
    let full_name = info.full_name.clone().unwrap_or_else(|| {
        format!("{} {}", family, spaced(info.subfamily.as_deref().unwrap_or("Regular")))
    });
    let copyright = info
        .copyright
        .clone()
        .or_else(|| previous.map(|f| f.copyright.clone()).filter(|c| !c.is_empty()))
        .unwrap_or_else(|| DEFAULT_COPYRIGHT.to_string());
    FontMetadata {
        name: family.to_string(),
        post_script_name: info.post_script_name.clone().unwrap_or_default(),
        full_name,
        style: if info.italic { "italic" } else { "normal" }.to_string(),
        weight: info.weight,
        filename: font.filename.clone(),
        copyright,
    }
}

/// `BoldItalic` -> `Bold Italic`.
fn spaced(camel: &str) -> String {
    let mut out = String::with_capacity(camel.len() + 4);
    for (i, ch) in camel.chars().enumerate() {
        if i > 0 && ch.is_ascii_uppercase() {
            out.push(' ');
        }
        out.push(ch);
    }
    out
}
