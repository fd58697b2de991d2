use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};

use cube::{Bitmap, ImageRegion, Recognizer, Rect, WordRecognition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RecognitionMode {
    /// A single word; internal spaces are forbidden.
    Word,
    /// A short phrase; spaces may be inserted at wide gaps.
    Phrase,
    /// A full line; it is split into phrases first.
    Line,
}

/// Recognizes a word, phrase or line image against a language's data files.
#[derive(Debug, Parser)]
#[command(name = "cube", version, about)]
struct Args {
    /// The language to recognize (names the data files, e.g. `eng`).
    #[arg(short, long)]
    lang: String,

    /// The directory containing the language data files.
    #[arg(short, long)]
    data_dir: PathBuf,

    /// The recognition mode.
    #[arg(short, long, value_enum, default_value = "word")]
    mode: RecognitionMode,

    /// The output format.
    #[arg(short, long, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Maximum number of alternates to print per word.
    #[arg(short = 'n', long, default_value_t = 5)]
    alternates: usize,

    /// The input image (PGM, dark ink on light background).
    image: PathBuf,
}

fn print_recognition(
    recognition: &WordRecognition,
    rect: Option<Rect>,
    args: &Args,
) -> anyhow::Result<()> {
    match args.output {
        OutputFormat::Json => {
            let mut value = serde_json::to_value(recognition)?;
            if let (Some(rect), Some(map)) = (rect, value.as_object_mut()) {
                map.insert("rect".to_string(), serde_json::to_value(rect)?);
            }
            if let Some(alternates) = value
                .as_object_mut()
                .and_then(|map| map.get_mut("alternates"))
                .and_then(|alts| alts.as_array_mut())
            {
                alternates.truncate(args.alternates);
            }
            println!("{}", serde_json::to_string(&value)?);
        }
        OutputFormat::Text => {
            if let Some(rect) = rect {
                println!(
                    "# phrase at ({}, {}) {}x{}",
                    rect.left, rect.top, rect.width, rect.height
                );
            }
            if recognition.alternates.is_empty() {
                println!("<no result>");
            }
            for alt in recognition.alternates.iter().take(args.alternates) {
                println!(
                    "{}\t{}\t{:.4}",
                    alt.word,
                    alt.cost,
                    cube::cost_to_prob(alt.cost)
                );
            }
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let recognizer = Recognizer::new(&args.lang, &args.data_dir)
        .with_context(|| format!("failed to load language {:?}", args.lang))?;

    let image_data = fs::read(&args.image)
        .with_context(|| format!("failed to read {}", args.image.display()))?;
    let bitmap = Bitmap::from_pgm(&image_data)
        .with_context(|| format!("failed to decode {}", args.image.display()))?;
    let region = ImageRegion::new(&bitmap);

    match args.mode {
        RecognitionMode::Word => {
            let recognition = recognizer.recognize_word(&region)?;
            print_recognition(&recognition, None, &args)?;
        }
        RecognitionMode::Phrase => {
            let recognition = recognizer.recognize_phrase(&region)?;
            print_recognition(&recognition, None, &args)?;
        }
        RecognitionMode::Line => {
            for rect in recognizer.split_line(&region)? {
                let phrase_region = ImageRegion::with_rect(&bitmap, rect);
                let recognition = recognizer.recognize_phrase(&phrase_region)?;
                print_recognition(&recognition, Some(rect), &args)?;
            }
        }
    }
    Ok(())
}
