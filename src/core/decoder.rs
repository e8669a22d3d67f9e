// src/core/decoder.rs
//
// Audio decoding to mono samples at the analysis sample rate.
// Uses Symphonia for format-agnostic decoding and rubato for resampling.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use log::debug;
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::Hint;

use super::dsp::filters::downmix;
use crate::error::{FindSimilarError, Result};

const RESAMPLE_CHUNK: usize = 1024;

/// Mono audio ready for analysis
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Mono samples in [-1.0, 1.0] at `sample_rate`
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Duration of the decoded (possibly truncated) audio
    pub duration_ms: u64,
    /// Title, artist and album tags found in the container
    pub tags: BTreeMap<String, String>,
}

/// Source of decoded audio; the engine never touches files directly
pub trait AudioDecoder: Send + Sync {
    /// Decode `path` to mono at `sample_rate`, keeping at most `max_seconds`
    fn decode(&self, path: &Path, sample_rate: u32, max_seconds: Option<u32>) -> Result<DecodedAudio>;
}

/// Symphonia-backed decoder for every format enabled in the `all` feature
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }
}

fn decode_error(path: &Path, what: impl std::fmt::Display) -> FindSimilarError {
    FindSimilarError::Decode(format!("{}: {}", path.display(), what))
}

fn collect_tags(revision: &MetadataRevision, tags: &mut BTreeMap<String, String>) {
    for tag in revision.tags() {
        let key = match tag.std_key {
            Some(StandardTagKey::TrackTitle) => "title",
            Some(StandardTagKey::Artist) => "artist",
            Some(StandardTagKey::Album) => "album",
            Some(StandardTagKey::Genre) => "genre",
            _ => continue,
        };
        tags.entry(key.to_string()).or_insert_with(|| tag.value.to_string());
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, path: &Path, sample_rate: u32, max_seconds: Option<u32>) -> Result<DecodedAudio> {
        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let mut probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| decode_error(path, format!("unsupported or corrupt file ({})", e)))?;

        let mut tags = BTreeMap::new();
        if let Some(revision) = probed.metadata.get().as_ref().and_then(|m| m.current()) {
            collect_tags(revision, &mut tags);
        }
        if let Some(revision) = probed.format.metadata().current() {
            collect_tags(revision, &mut tags);
        }

        let track = probed
            .format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| decode_error(path, "no supported audio track"))?;
        let track_id = track.id;
        let source_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| decode_error(path, "sample rate not specified"))?;
        let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2);
        if channels == 0 {
            return Err(decode_error(path, "file reports 0 audio channels"));
        }

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| decode_error(path, e))?;

        // Stop decoding once enough source audio has been read
        let limit = max_seconds
            .filter(|&s| s > 0)
            .map(|s| s as usize * source_rate as usize * channels);
        let mut interleaved: Vec<f32> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            if limit.is_some_and(|l| interleaved.len() >= l) {
                break;
            }
            let packet = match probed.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => return Err(decode_error(path, e)),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(buf) => buf,
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => return Err(decode_error(path, e)),
            };

            if sample_buf.is_none() {
                sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, *decoded.spec()));
            }
            if let Some(ref mut buf) = sample_buf {
                buf.copy_interleaved_ref(decoded);
                interleaved.extend_from_slice(buf.samples());
            }
        }

        if let Some(l) = limit {
            interleaved.truncate(l);
        }
        let mono = downmix(&interleaved, channels);
        let samples = resample(&mono, source_rate, sample_rate)?;
        let duration_ms = (mono.len() as u64 * 1000) / source_rate as u64;

        debug!(
            "decoded {}: {} Hz x {} ch -> {} samples at {} Hz",
            path.display(),
            source_rate,
            channels,
            samples.len(),
            sample_rate
        );

        Ok(DecodedAudio {
            samples,
            sample_rate,
            duration_ms,
            tags,
        })
    }
}

/// Band-limited sinc resampling of mono audio
pub fn resample(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
    if input_rate == output_rate || input.is_empty() {
        return Ok(input.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        oversampling_factor: 64,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = output_rate as f64 / input_rate as f64;
    let resample_err = |e: &dyn std::fmt::Display| FindSimilarError::Decode(format!("resampling failed: {}", e));
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLE_CHUNK, 1)
        .map_err(|e| resample_err(&e))?;

    let expected = (input.len() as f64 * ratio).round() as usize;
    let mut output = Vec::with_capacity(expected + RESAMPLE_CHUNK);
    let mut chunks = input.chunks_exact(RESAMPLE_CHUNK);
    for chunk in chunks.by_ref() {
        let out = resampler.process(&[chunk], None).map_err(|e| resample_err(&e))?;
        output.extend_from_slice(&out[0]);
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let out = resampler
            .process_partial(Some(&[rest][..]), None)
            .map_err(|e| resample_err(&e))?;
        output.extend_from_slice(&out[0]);
    }
    // Flush the filter delay line
    let out = resampler
        .process_partial::<&[f32]>(None, None)
        .map_err(|e| resample_err(&e))?;
    output.extend_from_slice(&out[0]);

    // Drop the leading filter delay and trim to the expected length
    let delay = resampler.output_delay().min(output.len());
    output.drain(..delay);
    output.truncate(expected);
    Ok(output)
}
