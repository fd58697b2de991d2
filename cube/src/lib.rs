//! Word/phrase recognition over pre-segmented word images. A `Recognizer`
//! wraps the per-language recognition context and exposes word, phrase,
//! single-character and line recognition over 8-bit grayscale rasters.

use std::path::Path;

use serde::Serialize;

pub use cube_core::altlist::{CharAlt, CharAltList, WordAlt, WordAltList};
pub use cube_core::bitmap::Bitmap;
pub use cube_core::context::RecoContext;
pub use cube_core::cost::{cost_to_prob, prob_to_cost, WORST_COST};
pub use cube_core::error::{CubeError, CubeErrorKind};
pub use cube_core::CubeResult;

use cube_core::cube_object::CubeObject;
use cube_core::phrase_splitter::PhraseSplitter;
use cube_core::sample::CharSample;

/// A rectangle in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub width: usize,
    pub height: usize,
}

/// An 8-bit grayscale raster plus the rectangle to recognize within it.
#[derive(Debug, Clone, Copy)]
pub struct ImageRegion<'a> {
    bitmap: &'a Bitmap,
    rect: Rect,
}

impl<'a> ImageRegion<'a> {
    /// The whole raster as one region.
    pub fn new(bitmap: &'a Bitmap) -> ImageRegion<'a> {
        ImageRegion {
            bitmap,
            rect: Rect {
                left: 0,
                top: 0,
                width: bitmap.width(),
                height: bitmap.height(),
            },
        }
    }

    pub fn with_rect(bitmap: &'a Bitmap, rect: Rect) -> ImageRegion<'a> {
        ImageRegion { bitmap, rect }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    fn to_sample(&self) -> CubeResult<CharSample> {
        if self.rect.width == 0
            || self.rect.height == 0
            || self.rect.left < 0
            || self.rect.top < 0
            || self.rect.left as usize + self.rect.width > self.bitmap.width()
            || self.rect.top as usize + self.rect.height > self.bitmap.height()
        {
            return Err(CubeErrorKind::Args.with_error(anyhow::anyhow!(
                "region {:?} out of raster bounds {}x{}",
                self.rect,
                self.bitmap.width(),
                self.bitmap.height()
            )));
        }
        let region = self.bitmap.copy_rect(
            self.rect.left as usize,
            self.rect.top as usize,
            self.rect.width,
            self.rect.height,
        );
        Ok(CharSample::from_bitmap(self.rect.left, self.rect.top, region))
    }
}

/// One aligned character of a recognized word: the edge string and the
/// bounding box of the segments it covers.
#[derive(Debug, Clone, Serialize)]
pub struct CharBox {
    pub text: String,
    pub rect: Rect,
}

/// The outcome of a word or phrase recognition: the ranked alternates and
/// the per-character alignment of the best one.
#[derive(Debug, Clone, Serialize)]
pub struct WordRecognition {
    pub alternates: Vec<WordAlt>,
    pub char_boxes: Vec<CharBox>,
}

impl WordRecognition {
    pub fn best(&self) -> Option<&WordAlt> {
        self.alternates.first()
    }
}

/// The per-language recognizer. Construction loads all language data; the
/// recognizer is then immutable and safe to share across threads, one
/// recognition at a time per call.
pub struct Recognizer {
    cntxt: RecoContext,
}

impl Recognizer {
    /// Loads the language data from a directory and builds a recognizer.
    pub fn new(lang: &str, data_dir: &Path) -> CubeResult<Recognizer> {
        let cntxt = RecoContext::load(data_dir, lang)?;
        Ok(Recognizer { cntxt })
    }

    /// Wraps an already-assembled context.
    pub fn from_context(cntxt: RecoContext) -> Recognizer {
        Recognizer { cntxt }
    }

    pub fn context(&self) -> &RecoContext {
        &self.cntxt
    }

    pub fn context_mut(&mut self) -> &mut RecoContext {
        &mut self.cntxt
    }

    /// Recognizes the region as a single word.
    pub fn recognize_word(&self, image: &ImageRegion) -> CubeResult<WordRecognition> {
        self.recognize(image, true)
    }

    /// Recognizes the region as a phrase, allowing implicit spaces.
    pub fn recognize_phrase(&self, image: &ImageRegion) -> CubeResult<WordRecognition> {
        self.recognize(image, false)
    }

    fn recognize(&self, image: &ImageRegion, word_mode: bool) -> CubeResult<WordRecognition> {
        let samp = image.to_sample()?;
        let mut cube_obj = CubeObject::new(&self.cntxt, samp);
        let alternates = match cube_obj.recognize(None, word_mode) {
            Some(alt_list) => alt_list.alts().to_vec(),
            None => Vec::new(),
        };

        let mut char_boxes = Vec::new();
        if let Some(node_id) = alternates.first().and_then(|alt| alt.node) {
            if let Some((samples, _)) = cube_obj.backtrack(node_id) {
                for char_samp in samples {
                    char_boxes.push(CharBox {
                        text: char_samp.label().unwrap_or_default().to_string(),
                        rect: Rect {
                            left: image.rect.left + char_samp.left(),
                            top: image.rect.top + char_samp.top(),
                            width: char_samp.width(),
                            height: char_samp.height(),
                        },
                    });
                }
            }
        }

        Ok(WordRecognition {
            alternates,
            char_boxes,
        })
    }

    /// Classifies the region as a single character.
    pub fn recognize_char(&self, image: &ImageRegion) -> CubeResult<Vec<CharAlt>> {
        let samp = image.to_sample()?;
        let cube_obj = CubeObject::new(&self.cntxt, samp);
        match cube_obj.recognize_char() {
            Some(alt_list) => Ok(alt_list.alts().to_vec()),
            None => Err(CubeErrorKind::ClassifierError
                .with_error(anyhow::anyhow!("no classification produced"))),
        }
    }

    /// Cost of the region rendering a candidate string.
    pub fn word_cost(&self, image: &ImageRegion, candidate: &str) -> CubeResult<i32> {
        let samp = image.to_sample()?;
        let mut cube_obj = CubeObject::new(&self.cntxt, samp);
        Ok(cube_obj.word_cost(candidate))
    }

    /// Slices a line region into phrase rectangles, in reading order.
    pub fn split_line(&self, image: &ImageRegion) -> CubeResult<Vec<Rect>> {
        let samp = image.to_sample()?;
        let splitter = PhraseSplitter::new(&self.cntxt);
        Ok(splitter
            .split(&samp)
            .into_iter()
            .map(|phrase| Rect {
                left: image.rect.left + phrase.left(),
                top: image.rect.top + phrase.top(),
                width: phrase.width(),
                height: phrase.height(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar_bitmap(bars: usize, gap: usize) -> Bitmap {
        let bar_wid = 3;
        let hgt = 10;
        let wid = bars * bar_wid + (bars - 1) * gap;
        let mut bmp = Bitmap::new(wid, hgt);
        for bar in 0..bars {
            let x0 = bar * (bar_wid + gap);
            for y in 0..hgt {
                for x in x0..x0 + bar_wid {
                    bmp.set(x, y, 0);
                }
            }
        }
        bmp
    }

    #[test]
    fn test_region_bounds_check() {
        let bmp = bar_bitmap(2, 2);
        let region = ImageRegion::with_rect(
            &bmp,
            Rect {
                left: 0,
                top: 0,
                width: bmp.width() + 1,
                height: bmp.height(),
            },
        );
        let err = region.to_sample().unwrap_err();
        assert_eq!(err.kind(), CubeErrorKind::Args);
    }

    #[test]
    fn test_full_region() {
        let bmp = bar_bitmap(2, 2);
        let region = ImageRegion::new(&bmp);
        let samp = region.to_sample().unwrap();
        assert_eq!(samp.width(), bmp.width());
        assert_eq!(samp.height(), bmp.height());
    }
}
