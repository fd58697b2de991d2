//! Core of a segmentation-driven word recognition engine. A pre-segmented
//! word image is decomposed into an ordered sequence of segments, and a
//! beam search explores all groupings of segments into characters jointly
//! with a generative language model, under a weighted sum of recognition,
//! size, character-bigram and word-unigram costs.

pub mod altlist;
pub mod beam_search;
pub mod bigrams;
pub mod bitmap;
pub mod charset;
pub mod classifier;
pub mod conncomp;
pub mod context;
pub mod conv_net_classifier;
pub mod cost;
pub mod cube_object;
pub mod dawg;
pub mod error;
pub mod features;
pub mod hybrid_classifier;
pub mod langmod;
pub mod nn;
pub mod phrase_splitter;
pub mod sample;
pub mod search_column;
pub mod search_object;
pub mod size_model;
pub mod tuning;
pub mod unigrams;
pub mod word_list_model;

pub type CubeResult<T> = Result<T, crate::error::CubeError>;
