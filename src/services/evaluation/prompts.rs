// Prompt Builder
// Zero-shot, few-shot and few-shot-with-reasoning prompts for splicing detection

use crate::models::{Category, FilenameRecord};
use crate::services::filename_patterns::parse_filename;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const ZERO_SHOT_PROMPT: &str = "Inspect the provided image and identify whether it is original or has been spliced. \
Answer with 'Authentic' for an unedited image, or 'Spliced' for a manipulated one.";

const FEW_SHOT_TASK_PROMPT: &str = "Inspect the following image and identify whether it is original or has been spliced. \
Answer with 'Authentic' for an unedited image, or 'Spliced' for a manipulated one. ";

const COT_TASK_PROMPT: &str = "Inspect the following image and identify whether it is original or has been spliced. \
Only Answer with 'Authentic' for an unedited image, or 'Spliced' for a manipulated one. ";

/// One element of a multimodal chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image(url: String) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl { url },
        }
    }
}

/// A reference image paired with its written reasoning.
#[derive(Debug, Clone, PartialEq)]
pub struct CotExample {
    pub image: PathBuf,
    pub reasoning: String,
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        _ => "image/jpeg",
    }
}

/// `data:<mime>;base64,<bytes>` for an image file.
pub fn encode_image_data_url(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(format!("data:{};base64,{}", mime_for(path), STANDARD.encode(bytes)))
}

pub fn image_part(path: &Path) -> io::Result<ContentPart> {
    Ok(ContentPart::image(encode_image_data_url(path)?))
}

pub fn zero_shot_prompt() -> Vec<ContentPart> {
    vec![ContentPart::text(ZERO_SHOT_PROMPT)]
}

pub fn few_shot_prompt(authentic: &[PathBuf], spliced: &[PathBuf]) -> io::Result<Vec<ContentPart>> {
    let mut parts = Vec::with_capacity((authentic.len() + spliced.len()) * 2 + 1);

    for path in authentic {
        parts.push(ContentPart::text("For example, this image is Authentic."));
        parts.push(image_part(path)?);
    }
    for path in spliced {
        parts.push(ContentPart::text("For example, this image is Spliced."));
        parts.push(image_part(path)?);
    }

    parts.push(ContentPart::text(FEW_SHOT_TASK_PROMPT));
    Ok(parts)
}

pub fn few_shot_cot_prompt(
    authentic: &[CotExample],
    spliced: &[CotExample],
) -> io::Result<Vec<ContentPart>> {
    let mut parts = Vec::with_capacity((authentic.len() + spliced.len()) * 2 + 1);

    for example in authentic {
        parts.push(ContentPart::text(format!(
            "For example, this image is Authentic. {}",
            example.reasoning
        )));
        parts.push(image_part(&example.image)?);
    }
    for example in spliced {
        parts.push(ContentPart::text(format!(
            "For example, this image is Spliced. {}",
            example.reasoning
        )));
        parts.push(image_part(&example.image)?);
    }

    parts.push(ContentPart::text(COT_TASK_PROMPT));
    Ok(parts)
}

/// Category a target image is matched on: the authentic category, or the
/// source category of a tampered image.
pub fn primary_category(filename: &str) -> Option<Category> {
    match parse_filename(filename)? {
        FilenameRecord::Authentic(category) => Some(category),
        FilenameRecord::Tampered(pair) => Some(pair.source),
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn pick_examples<R: Rng + ?Sized>(
    category: Option<&Category>,
    pool: &[PathBuf],
    per_class: usize,
    rng: &mut R,
) -> Vec<PathBuf> {
    let matching: Vec<PathBuf> = match category {
        Some(category) => pool
            .iter()
            .filter(|p| {
                parse_filename(&file_name_of(p))
                    .map(|r| r.involves(category))
                    .unwrap_or(false)
            })
            .cloned()
            .collect(),
        None => Vec::new(),
    };

    let source = if matching.is_empty() { pool } else { &matching[..] };
    source
        .choose_multiple(rng, per_class.min(source.len()))
        .cloned()
        .collect()
}

/// Up to `per_class` examples of the target's category from each pool. A pool
/// with no example of that category falls back to random picks from the whole pool.
pub fn select_few_shot_examples<R: Rng + ?Sized>(
    target: &Path,
    authentic_pool: &[PathBuf],
    spliced_pool: &[PathBuf],
    per_class: usize,
    rng: &mut R,
) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let category = primary_category(&file_name_of(target));
    let authentic = pick_examples(category.as_ref(), authentic_pool, per_class, rng);
    let spliced = pick_examples(category.as_ref(), spliced_pool, per_class, rng);
    (authentic, spliced)
}

/// Reasoning files `<stem>.txt` in `cot_dir` whose image `<stem>.jpg` exists in
/// `image_dir` and belongs to `category`. Sorted by file name.
pub fn match_cot_examples(
    category: &Category,
    cot_dir: &Path,
    image_dir: &Path,
) -> io::Result<Vec<CotExample>> {
    let mut cot_files: Vec<String> = fs::read_dir(cot_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with(".txt"))
        .collect();
    cot_files.sort();

    let mut examples = Vec::new();
    for cot_file in cot_files {
        let stem = cot_file.trim_end_matches(".txt");
        let image_name = format!("{}.jpg", stem);
        let belongs = parse_filename(&image_name)
            .map(|r| r.involves(category))
            .unwrap_or(false);
        if !belongs {
            continue;
        }

        let image = image_dir.join(&image_name);
        if image.is_file() {
            let reasoning = fs::read_to_string(cot_dir.join(&cot_file))?.trim().to_string();
            examples.push(CotExample { image, reasoning });
        }
    }
    Ok(examples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_content_part_wire_format() {
        let text = serde_json::to_value(ContentPart::text("hi")).unwrap();
        assert_eq!(text, serde_json::json!({"type": "text", "text": "hi"}));

        let image = serde_json::to_value(ContentPart::image("data:x".to_string())).unwrap();
        assert_eq!(
            image,
            serde_json::json!({"type": "image_url", "image_url": {"url": "data:x"}})
        );
    }

    #[test]
    fn test_encode_image_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let jpg = dir.path().join("a.jpg");
        let png = dir.path().join("b.PNG");
        fs::write(&jpg, b"abc").unwrap();
        fs::write(&png, b"abc").unwrap();
        assert_eq!(encode_image_data_url(&jpg).unwrap(), "data:image/jpeg;base64,YWJj");
        assert!(encode_image_data_url(&png).unwrap().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_few_shot_prompt_layout() {
        let dir = tempfile::tempdir().unwrap();
        let au = dir.path().join("Au_ani_1.jpg");
        let sp = dir.path().join("Tp_D_X_X_X_ani1_arc2_001.jpg");
        fs::write(&au, b"a").unwrap();
        fs::write(&sp, b"s").unwrap();

        let parts = few_shot_prompt(&[au], &[sp]).unwrap();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0], ContentPart::text("For example, this image is Authentic."));
        assert!(matches!(parts[1], ContentPart::ImageUrl { .. }));
        assert_eq!(parts[2], ContentPart::text("For example, this image is Spliced."));
        assert!(matches!(&parts[4], ContentPart::Text { text } if text.starts_with("Inspect")));
    }

    #[test]
    fn test_select_few_shot_examples_matches_category() {
        let au_pool: Vec<PathBuf> = ["Au_ani_1.jpg", "Au_ani_2.jpg", "Au_ani_3.jpg", "Au_arc_1.jpg"]
            .iter()
            .map(|s| PathBuf::from(*s))
            .collect();
        let sp_pool: Vec<PathBuf> = ["Tp_D_X_X_X_cha1_arc2_001.jpg", "Tp_D_X_X_X_cha1_cha2_002.jpg"]
            .iter()
            .map(|s| PathBuf::from(*s))
            .collect();

        let mut rng = StdRng::seed_from_u64(42);
        let (au, sp) =
            select_few_shot_examples(Path::new("Au_ani_9.jpg"), &au_pool, &sp_pool, 2, &mut rng);
        assert_eq!(au.len(), 2);
        assert!(au.iter().all(|p| p.to_string_lossy().starts_with("Au_ani_")));
        // no spliced ani example: fallback to the whole pool
        assert_eq!(sp.len(), 2);
    }

    #[test]
    fn test_match_cot_examples() {
        let cot = tempfile::tempdir().unwrap();
        let img = tempfile::tempdir().unwrap();
        fs::write(cot.path().join("Au_ani_1.txt"), "  Lighting is consistent.\n").unwrap();
        fs::write(cot.path().join("Au_arc_1.txt"), "Other category").unwrap();
        fs::write(cot.path().join("Au_ani_2.txt"), "Image missing").unwrap();
        fs::write(img.path().join("Au_ani_1.jpg"), b"x").unwrap();
        fs::write(img.path().join("Au_arc_1.jpg"), b"x").unwrap();

        let examples = match_cot_examples(&Category::new("ani"), cot.path(), img.path()).unwrap();
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].reasoning, "Lighting is consistent.");
        assert_eq!(examples[0].image, img.path().join("Au_ani_1.jpg"));
    }
}
