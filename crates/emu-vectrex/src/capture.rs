//! Headless capture: JSON vector dumps, WAV audio and state files.

use std::error::Error;
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::Vectrex;
use crate::analog::Vector;
use crate::audio;
use crate::config::SAMPLE_RATE;

/// Save a vector list as a JSON array of `{x0, y0, x1, y1, color}`.
pub fn save_vectors(vectors: &[Vector], path: &Path) -> Result<(), Box<dyn Error>> {
    let file = fs::File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), vectors)?;
    Ok(())
}

/// Read back a dump written by [`save_vectors`].
pub fn load_vectors(path: &Path) -> Result<Vec<Vector>, Box<dyn Error>> {
    let file = fs::File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Save PSG levels as a WAV file (mono, 44.1 kHz, 16-bit PCM).
pub fn save_audio(levels: &[u8], path: &Path) -> Result<(), Box<dyn Error>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &level in levels {
        writer.write_sample(audio::sample_to_pcm16(level))?;
    }
    writer.finalize()?;
    Ok(())
}

pub fn save_state_file(vectrex: &Vectrex, path: &Path) -> Result<(), Box<dyn Error>> {
    fs::write(path, vectrex.save_state())?;
    Ok(())
}

/// Restore a state file. The machine is untouched if the file is
/// unreadable or invalid.
pub fn load_state_file(vectrex: &mut Vectrex, path: &Path) -> Result<(), Box<dyn Error>> {
    let data = fs::read(path)?;
    vectrex.load_state(&data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::process;

    fn temp_path(name: &str) -> std::path::PathBuf {
        env::temp_dir().join(format!("emu-vectrex-{}-{name}", process::id()))
    }

    #[test]
    fn wav_header_matches_host_rate() {
        let path = temp_path("audio.wav");
        save_audio(&[0, 8, 15, 8], &path).expect("write wav");
        let reader = hound::WavReader::open(&path).expect("read wav");
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 44_100);
        assert_eq!(spec.bits_per_sample, 16);
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<_, _>>()
            .expect("samples");
        assert_eq!(samples, vec![-0x7FF, 1, 0x0F00 - 0x7FF, 1]);
        let _ = fs::remove_file(&path);
    }
}
