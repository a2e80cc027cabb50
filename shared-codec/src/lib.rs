//! Stateless G.711 µ-law <-> linear PCM16 conversion and a naive 8kHz -> 16kHz
//! upsampler. Every function here is pure and allocation-light so it is safe
//! to call on every inbound telephony frame (roughly 50 times a second).

/// Decode a single G.711 µ-law byte to a 16-bit linear PCM sample.
pub fn mulaw_decode_sample(byte: u8) -> i16 {
    let inverted = !byte;
    let sign = inverted & 0x80;
    let exponent = (inverted >> 4) & 0x07;
    let mantissa = inverted & 0x0F;

    let magnitude = (((mantissa as i32) << 3) + 0x84) << exponent;
    let magnitude = magnitude - 0x84;

    let sample = if sign != 0 { -magnitude } else { magnitude };
    sample as i16
}

/// Expand µ-law bytes (8kHz) into 16-bit signed little-endian PCM (8kHz).
/// Output is exactly 2x the input length.
pub fn mulaw_to_pcm16(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() * 2);
    for &b in input {
        out.extend_from_slice(&mulaw_decode_sample(b).to_le_bytes());
    }
    out
}

/// Sample-duplication upsample from 8kHz to 16kHz. No anti-imaging filter;
/// this trades audio quality for minimum latency, which is adequate for a
/// speech LLM input path. Output is exactly 2x the input length.
pub fn upsample_8k_to_16k(pcm16_le: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pcm16_le.len() * 2);
    for chunk in pcm16_le.chunks_exact(2) {
        out.extend_from_slice(chunk);
        out.extend_from_slice(chunk);
    }
    out
}

/// Interpret little-endian PCM16 bytes as signed samples, for callers (VAD)
/// that need the samples rather than the wire bytes.
pub fn pcm16_le_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mulaw_sign_inversion_boundary() {
        assert_eq!(mulaw_decode_sample(0xFF), 0);
        assert_eq!(mulaw_decode_sample(0x7F), 0);
    }

    #[test]
    fn mulaw_to_pcm16_doubles_length() {
        let input = vec![0xFF, 0x00, 0x7F, 0x80];
        let out = mulaw_to_pcm16(&input);
        assert_eq!(out.len(), input.len() * 2);
    }

    #[test]
    fn upsample_doubles_length() {
        let pcm = vec![0x01, 0x02, 0x03, 0x04];
        let out = upsample_8k_to_16k(&pcm);
        assert_eq!(out.len(), pcm.len() * 2);
        assert_eq!(&out, &[0x01, 0x02, 0x01, 0x02, 0x03, 0x04, 0x03, 0x04]);
    }

    #[test]
    fn full_ingress_chain_quadruples_byte_count() {
        let mulaw = vec![0x00, 0xFF, 0x7F, 0x10];
        let pcm8k = mulaw_to_pcm16(&mulaw);
        let pcm16k = upsample_8k_to_16k(&pcm8k);
        assert_eq!(pcm16k.len(), mulaw.len() * 4);
    }

    #[test]
    fn pcm16_le_to_samples_round_trips_bytes() {
        let samples: Vec<i16> = vec![-100, 0, 32767, -32768];
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        assert_eq!(pcm16_le_to_samples(&bytes), samples);
    }
}
