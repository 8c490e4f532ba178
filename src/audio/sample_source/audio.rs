// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::get_codecs;
use symphonia::default::get_probe;

use super::error::SampleSourceError;
use super::traits::SampleSource;

/// A sample source that reads audio files (WAV, MP3, FLAC, etc.) and provides scaled samples.
pub struct AudioSampleSource {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    is_finished: bool,
    // Planar samples from the last decoded packet that haven't been handed out yet.
    pending: Vec<Vec<f32>>,
    pending_position: usize,
    bits_per_sample: u16,
    channels: u16,
    sample_rate: u32,
    duration: Option<Duration>,
}

impl SampleSource for AudioSampleSource {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        let num_channels = self.channels as usize;
        if output.len() != num_channels {
            return Err(SampleSourceError::SampleConversionFailed(format!(
                "Output has {} channels, expected {}",
                output.len(),
                num_channels
            )));
        }

        for ch in output.iter_mut() {
            ch.clear();
        }

        let mut written = 0;
        while written < max_frames {
            let available = self
                .pending
                .first()
                .map_or(0, |plane| plane.len())
                .saturating_sub(self.pending_position);

            if available == 0 {
                if self.is_finished {
                    break;
                }
                match Self::read_and_decode_next_packet_for_track(
                    self.format_reader.as_mut(),
                    self.decoder.as_mut(),
                    self.track_id,
                )? {
                    Some(planes) => self.set_pending(planes)?,
                    None => self.is_finished = true,
                }
                continue;
            }

            let to_copy = available.min(max_frames - written);
            let range = self.pending_position..self.pending_position + to_copy;
            for (out_ch, plane) in output.iter_mut().zip(self.pending.iter()) {
                out_ch.extend_from_slice(&plane[range.clone()]);
            }
            self.pending_position += to_copy;
            written += to_copy;
        }

        Ok(written)
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }
}

impl AudioSampleSource {
    /// Creates a new audio sample source from a file path
    /// Supports WAV, MP3, FLAC, and other formats supported by symphonia
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SampleSourceError> {
        // Include the path in the error so the user sees which file failed.
        let path_ref = path.as_ref();
        let file = File::open(path_ref).map_err(|e| {
            SampleSourceError::IoError(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path_ref.display(), e),
            ))
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path_ref.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();
        let file_path = path_ref.to_string_lossy().to_string();
        let probed = get_probe()
            .format(&hint, mss, &fmt_opts, &meta_opts)
            .map_err(|e| {
                SampleSourceError::SampleConversionFailed(format!("'{}': {}", file_path, e))
            })?;

        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                SampleSourceError::SampleConversionFailed(format!(
                    "'{}': no audio track found",
                    file_path
                ))
            })?;

        let track_id = track.id;
        let params = &track.codec_params;

        let sample_rate = params.sample_rate.ok_or_else(|| {
            SampleSourceError::SampleConversionFailed(format!(
                "'{}': sample rate not specified",
                file_path
            ))
        })?;
        let bits_per_sample = params.bits_per_sample.unwrap_or(16) as u16;
        let duration = params
            .n_frames
            .map(|n_frames| Duration::from_secs_f64(n_frames as f64 / sample_rate as f64));

        let decoder_opts: DecoderOptions = Default::default();
        let mut decoder = get_codecs().make(params, &decoder_opts).map_err(|e| {
            SampleSourceError::SampleConversionFailed(format!("'{}': {}", file_path, e))
        })?;

        // Prefer the container's channel count. If it's missing, decode the first
        // packet and take the count from the decoded buffer instead.
        let channels = params.channels.map(|c| c.count() as u16).unwrap_or(0);
        let (channels, initial_pending) = if channels > 0 {
            (channels, Vec::new())
        } else {
            Self::detect_channels_and_prime_buffer(
                format_reader.as_mut(),
                decoder.as_mut(),
                track_id,
            )?
        };

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            is_finished: false,
            pending: initial_pending,
            pending_position: 0,
            bits_per_sample,
            channels,
            sample_rate,
            duration,
        })
    }

    fn set_pending(&mut self, planes: Vec<Vec<f32>>) -> Result<(), SampleSourceError> {
        if planes.len() != self.channels as usize {
            return Err(SampleSourceError::SampleConversionFailed(format!(
                "decoded packet has {} channels, expected {}",
                planes.len(),
                self.channels
            )));
        }
        self.pending = planes;
        self.pending_position = 0;
        Ok(())
    }

    /// Reads the next packet.
    /// Returns:
    /// - `Ok(Some(packet))` if a packet was successfully read
    /// - `Ok(None)` if EOF was reached (UnexpectedEof or DecodeError)
    /// - `Err(...)` if an error occurred that should be returned
    fn read_next_packet(
        format_reader: &mut dyn FormatReader,
    ) -> Result<Option<Packet>, SampleSourceError> {
        match format_reader.next_packet() {
            Ok(packet) => Ok(Some(packet)),
            Err(SymphoniaError::ResetRequired) => {
                Err(SampleSourceError::AudioError(SymphoniaError::ResetRequired))
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Ok(None)
            }
            // Some decoders return DecodeError at EOF instead of IoError
            Err(SymphoniaError::DecodeError(_)) => Ok(None),
            Err(e) => Err(SampleSourceError::AudioError(e)),
        }
    }

    /// Reads and decodes the next non-empty packet for the given track, resetting the
    /// decoder when required. Returns `Ok(None)` on EOF.
    fn read_and_decode_next_packet_for_track(
        format_reader: &mut dyn FormatReader,
        decoder: &mut dyn Decoder,
        track_id: u32,
    ) -> Result<Option<Vec<Vec<f32>>>, SampleSourceError> {
        loop {
            let packet = match Self::read_next_packet(format_reader) {
                Ok(Some(packet)) => packet,
                Ok(None) => return Ok(None),
                Err(SampleSourceError::AudioError(SymphoniaError::ResetRequired)) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => return Err(e),
            };
            if packet.track_id() != track_id {
                continue;
            }
            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    decoder.decode(&packet)?
                }
                Err(e) => return Err(SampleSourceError::AudioError(e)),
            };

            // Header packets (e.g. Ogg/Vorbis) can decode to zero frames.
            let planes = Self::decode_buffer_to_planar(decoded);
            if planes.first().is_some_and(|plane| !plane.is_empty()) {
                return Ok(Some(planes));
            }
        }
    }

    /// Decodes the first audio packet to find the channel count when the container
    /// doesn't report it. The decoded samples are kept as the first pending chunk.
    fn detect_channels_and_prime_buffer(
        format_reader: &mut dyn FormatReader,
        decoder: &mut dyn Decoder,
        track_id: u32,
    ) -> Result<(u16, Vec<Vec<f32>>), SampleSourceError> {
        match Self::read_and_decode_next_packet_for_track(format_reader, decoder, track_id)? {
            Some(planes) => Ok((planes.len() as u16, planes)),
            None => Err(SampleSourceError::SampleConversionFailed(
                "Channels not specified".to_string(),
            )),
        }
    }

    /// Converts a decoded buffer to planar f32 samples.
    fn decode_buffer_to_planar(decoded: AudioBufferRef) -> Vec<Vec<f32>> {
        match decoded {
            AudioBufferRef::F32(buf) => Self::copy_planes(&buf, |sample| sample),
            AudioBufferRef::F64(buf) => Self::copy_planes(&buf, |sample| sample as f32),
            AudioBufferRef::S8(buf) => Self::copy_planes(&buf, Self::scale_s8),
            AudioBufferRef::S16(buf) => Self::copy_planes(&buf, Self::scale_s16),
            AudioBufferRef::S24(buf) => {
                Self::copy_planes(&buf, |sample| Self::scale_s24(sample.inner()))
            }
            AudioBufferRef::S32(buf) => Self::copy_planes(&buf, Self::scale_s32),
            AudioBufferRef::U8(buf) => Self::copy_planes(&buf, Self::scale_u8),
            AudioBufferRef::U16(buf) => Self::copy_planes(&buf, Self::scale_u16),
            AudioBufferRef::U24(buf) => {
                Self::copy_planes(&buf, |sample| Self::scale_u24(sample.inner()))
            }
            AudioBufferRef::U32(buf) => Self::copy_planes(&buf, Self::scale_u32),
        }
    }

    fn copy_planes<T, F>(buf: &AudioBuffer<T>, convert: F) -> Vec<Vec<f32>>
    where
        T: symphonia::core::sample::Sample,
        F: Fn(T) -> f32,
    {
        let frames = buf.frames();
        let planes = buf.planes();
        planes
            .planes()
            .iter()
            .map(|plane| plane[..frames].iter().map(|sample| convert(*sample)).collect())
            .collect()
    }

    // Scaling helpers for all integer formats.

    #[inline]
    pub(crate) fn scale_s8(sample: i8) -> f32 {
        sample as f32 / (1i64 << 7) as f32
    }

    #[inline]
    pub(crate) fn scale_s16(sample: i16) -> f32 {
        sample as f32 / (1i64 << 15) as f32
    }

    #[inline]
    pub(crate) fn scale_s24(sample: i32) -> f32 {
        sample as f32 / (1i64 << 23) as f32
    }

    #[inline]
    pub(crate) fn scale_s32(sample: i32) -> f32 {
        sample as f32 / (1i64 << 31) as f32
    }

    #[inline]
    pub(crate) fn scale_u8(sample: u8) -> f32 {
        (sample as f32 / u8::MAX as f32) * 2.0 - 1.0
    }

    #[inline]
    pub(crate) fn scale_u16(sample: u16) -> f32 {
        (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
    }

    #[inline]
    pub(crate) fn scale_u24(sample: u32) -> f32 {
        let max = (1u32 << 24) - 1;
        (sample as f32 / max as f32) * 2.0 - 1.0
    }

    #[inline]
    pub(crate) fn scale_u32(sample: u32) -> f32 {
        (sample as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use tempfile::tempdir;

    use crate::testutil::write_wav;

    use super::*;

    #[test]
    fn test_scale_helpers() {
        assert_eq!(AudioSampleSource::scale_s8(-128), -1.0);
        assert_eq!(AudioSampleSource::scale_s16(16384), 0.5);
        assert_eq!(AudioSampleSource::scale_s24(-(1 << 22)), -0.5);
        assert_eq!(AudioSampleSource::scale_s32(i32::MIN), -1.0);
        assert_eq!(AudioSampleSource::scale_u8(0), -1.0);
        assert_eq!(AudioSampleSource::scale_u8(u8::MAX), 1.0);
        assert_eq!(AudioSampleSource::scale_u16(u16::MAX), 1.0);
        assert_eq!(AudioSampleSource::scale_u24((1 << 24) - 1), 1.0);
        assert_eq!(AudioSampleSource::scale_u32(0), -1.0);
    }

    #[test]
    fn test_reads_stereo_wav() -> Result<(), Box<dyn Error>> {
        let tempdir = tempdir()?;
        let path = tempdir.path().join("stereo.wav");
        write_wav(
            path.clone(),
            vec![
                vec![1_i32 << 30, 0, -(1 << 30)],
                vec![-(1_i32 << 29), 1 << 29, 0],
            ],
            44100,
        )?;

        let mut source = AudioSampleSource::from_file(&path)?;
        assert_eq!(source.channel_count(), 2);
        assert_eq!(source.sample_rate(), 44100);
        assert_eq!(source.bits_per_sample(), 32);

        let mut output = vec![Vec::new(), Vec::new()];
        assert_eq!(source.next_chunk(&mut output, 16)?, 3);
        assert_eq!(output[0], vec![0.5, 0.0, -0.5]);
        assert_eq!(output[1], vec![-0.25, 0.25, 0.0]);

        assert_eq!(source.next_chunk(&mut output, 16)?, 0);
        assert!(output[0].is_empty());
        Ok(())
    }

    #[test]
    fn test_reads_in_small_chunks() -> Result<(), Box<dyn Error>> {
        let tempdir = tempdir()?;
        let path = tempdir.path().join("mono.wav");
        write_wav(path.clone(), vec![vec![0.1_f32, 0.2, 0.3, 0.4, 0.5]], 48000)?;

        let mut source = AudioSampleSource::from_file(&path)?;
        assert_eq!(source.channel_count(), 1);

        let mut output = vec![Vec::new()];
        let mut collected = Vec::new();
        loop {
            let frames = source.next_chunk(&mut output, 2)?;
            if frames == 0 {
                break;
            }
            assert!(frames <= 2);
            collected.extend_from_slice(&output[0]);
        }
        assert_eq!(collected, vec![0.1, 0.2, 0.3, 0.4, 0.5]);
        Ok(())
    }

    #[test]
    fn test_wrong_output_channels() -> Result<(), Box<dyn Error>> {
        let tempdir = tempdir()?;
        let path = tempdir.path().join("mono.wav");
        write_wav(path.clone(), vec![vec![0.1_f32]], 48000)?;

        let mut source = AudioSampleSource::from_file(&path)?;
        let mut output = vec![Vec::new(), Vec::new()];
        assert!(matches!(
            source.next_chunk(&mut output, 1),
            Err(SampleSourceError::SampleConversionFailed(_))
        ));
        Ok(())
    }

    #[test]
    fn test_missing_file_names_path() {
        let result = AudioSampleSource::from_file("/nonexistent/25-C 6.wav");
        match result {
            Err(SampleSourceError::IoError(e)) => assert!(e.to_string().contains("25-C 6.wav")),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("expected an error"),
        }
    }
}
