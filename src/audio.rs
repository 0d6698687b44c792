//! Audio decode service
//!
//! Turns uploaded bytes into the mono sample buffer the onset detector reads.
//! Natively this goes through symphonia; in the browser the Web Audio API
//! does the decoding and we copy out channel 0.

use crate::error::InputError;
#[cfg(not(target_arch = "wasm32"))]
use crate::error::DecodeError;

/// What an upload will be played as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// Decoded up front and charted by onset detection
    Audio,
    /// Played through a media element with the fixed cadence chart
    Video,
}

/// Decide how to handle an upload from its MIME type and file name
pub fn classify_upload(mime: &str, filename: &str) -> Result<UploadKind, InputError> {
    if mime.starts_with("audio/") || filename.to_ascii_lowercase().ends_with(".mp3") {
        Ok(UploadKind::Audio)
    } else if mime == "video/mp4" {
        Ok(UploadKind::Video)
    } else {
        let shown = if mime.is_empty() { filename } else { mime };
        Err(InputError::UnsupportedFormat(shown.to_string()))
    }
}

/// First channel of a decoded track
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub channel_data: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.channel_data.len() as f64 / f64::from(self.sample_rate)
    }
}

/// Decode an encoded file (mp3/flac/wav) held in memory
#[cfg(not(target_arch = "wasm32"))]
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedAudio, DecodeError> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::errors::Error;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let codec_err = |e: Error| DecodeError::Codec(e.to_string());

    let mss = MediaSourceStream::new(Box::new(std::io::Cursor::new(bytes)), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(codec_err)?;

    let mut format = probed.format;
    let track = format.default_track().ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(DecodeError::UnknownSampleRate)?;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(codec_err)?;

    let mut channel_data = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(Error::ResetRequired) => break,
            Err(e) => return Err(codec_err(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let channels = spec.channels.count().max(1);
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                channel_data.extend(buf.samples().iter().step_by(channels).copied());
            }
            // Skip corrupt frames
            Err(Error::DecodeError(e)) => log::debug!("Skipping bad frame: {}", e),
            Err(Error::IoError(_)) => continue,
            Err(e) => return Err(codec_err(e)),
        }
    }

    if channel_data.is_empty() {
        return Err(DecodeError::Empty);
    }
    log::info!(
        "Decoded {} samples at {} Hz",
        channel_data.len(),
        sample_rate
    );
    Ok(DecodedAudio {
        channel_data,
        sample_rate,
    })
}

/// Decode through the page's AudioContext. Resolves to the playable buffer
/// plus its first channel, or a user-facing message.
#[cfg(target_arch = "wasm32")]
pub async fn decode_in_browser(
    ctx: &web_sys::AudioContext,
    bytes: js_sys::ArrayBuffer,
) -> Result<(web_sys::AudioBuffer, DecodedAudio), String> {
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;

    let promise = ctx
        .decode_audio_data(&bytes)
        .map_err(|e| format!("Error decoding audio: {:?}", e))?;
    let buffer: web_sys::AudioBuffer = JsFuture::from(promise)
        .await
        .map_err(|e| format!("Error decoding audio: {:?}", e))?
        .dyn_into()
        .map_err(|_| "Error decoding audio.".to_string())?;
    let channel_data = buffer
        .get_channel_data(0)
        .map_err(|e| format!("Error decoding audio: {:?}", e))?;
    let decoded = DecodedAudio {
        channel_data,
        sample_rate: buffer.sample_rate() as u32,
    };
    Ok((buffer, decoded))
}
