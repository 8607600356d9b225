//! The one base decoder implementation shared by every container format:
//! a frame-aligned byte-range view onto an already-decoded PCM buffer.

use std::sync::Arc;

use crate::common::{AudioFormat, BitDepth, ChannelCount, SampleRate};
use crate::container::PcmSource;
use crate::decoder::Stage;

pub struct PcmBaseDecoder {
    source: Arc<dyn PcmSource>,
    data_start: u64,
    format: AudioFormat,
}

impl PcmBaseDecoder {
    pub fn new(source: Arc<dyn PcmSource>, data_start: u64, format: AudioFormat) -> Self {
        Self {
            source,
            data_start,
            format,
        }
    }
}

impl Stage for PcmBaseDecoder {
    fn read_samples(&mut self, buf: &mut [u8], position_bytes: u64, max_bytes: usize) -> usize {
        let frame = self.frame_size().max(1);
        let remaining = self.format.data_size.saturating_sub(position_bytes);
        let want = max_bytes.min(buf.len()).min(remaining as usize);
        let want = want - want % frame;
        if want == 0 {
            return 0;
        }
        self.source
            .read_at(self.data_start + position_bytes, &mut buf[..want])
            .unwrap_or(0)
    }

    fn channels(&self) -> ChannelCount {
        self.format.channels
    }

    fn sample_rate(&self) -> SampleRate {
        self.format.sample_rate
    }

    fn bits_per_sample(&self) -> BitDepth {
        self.format.bits_per_sample
    }

    fn data_size(&self) -> u64 {
        self.format.data_size
    }

    fn peel(self: Box<Self>) -> Box<dyn Stage> {
        panic!("cannot peel a base decoder: PcmBaseDecoder has no downstream");
    }

    fn clone_stage(&self) -> Box<dyn Stage> {
        Box::new(Self {
            source: self.source.clone(),
            data_start: self.data_start,
            format: self.format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::InMemorySource;

    fn decoder(data: Vec<u8>) -> PcmBaseDecoder {
        let format = AudioFormat {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            data_size: data.len() as u64,
        };
        PcmBaseDecoder::new(Arc::new(InMemorySource::new(data)), 0, format)
    }

    #[test]
    fn reads_frame_aligned_chunks() {
        let mut dec = decoder(vec![1, 2, 3, 4, 5, 6]);
        let mut buf = [0u8; 5];
        let n = dec.read_samples(&mut buf, 0, 5);
        assert_eq!(n, 4); // 5 truncated down to the nearest 2-byte frame
        assert_eq!(&buf[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn reports_zero_past_the_end() {
        let mut dec = decoder(vec![1, 2, 3, 4]);
        let mut buf = [0u8; 4];
        assert_eq!(dec.read_samples(&mut buf, 4, 4), 0);
    }

    #[test]
    fn honors_a_nonzero_data_start_offset() {
        let format = AudioFormat {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            data_size: 4,
        };
        let source = InMemorySource::new(vec![0xff, 0xff, 1, 2, 3, 4]);
        let mut dec = PcmBaseDecoder::new(Arc::new(source), 2, format);
        let mut buf = [0u8; 4];
        let n = dec.read_samples(&mut buf, 0, 4);
        assert_eq!(n, 4);
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    #[should_panic(expected = "cannot peel a base decoder")]
    fn peel_panics() {
        let dec = decoder(vec![0; 4]);
        let _ = Box::new(dec).peel();
    }
}
