//! Shift-encoded 16-bit depth bitstream
//!
//! Each sample is coded relative to the previous one (initially 0):
//!
//! | code                  | meaning                                  |
//! |-----------------------|------------------------------------------|
//! | `00`                  | repeat previous value                    |
//! | `11` / `10`           | previous + 1 / previous - 1              |
//! | `010` + 5 bits `n`    | repeat previous value `n + 5` times      |
//! | `0110` + 1 bit        | previous - 2 (`0`) / previous + 2 (`1`)  |
//! | `0111` + 11 bits `v`  | literal `v`                              |
//!
//! Literal `0x7FF` is an escape: a full 16-bit literal follows, so values
//! above the 11-bit range survive the round trip.

use contracts::{ContractError, Result};

use crate::bitstream::{BitReader, BitWriter};

const LITERAL_BITS: u8 = 11;
const LITERAL_ESCAPE: u32 = (1 << LITERAL_BITS) - 1;
const MIN_RUN: usize = 5;
const MAX_RUN: usize = MIN_RUN + 31;

/// Encode depth samples into a packed bitstream
pub fn encode(samples: &[u16]) -> Vec<u8> {
    let mut writer = BitWriter::with_capacity(samples.len() / 2);
    let mut last: u16 = 0;
    let mut run = 0usize;

    for &value in samples {
        if value == last {
            run += 1;
            continue;
        }
        flush_run(&mut writer, &mut run);

        match value as i32 - last as i32 {
            1 => writer.put(0b11, 2),
            -1 => writer.put(0b10, 2),
            2 => writer.put(0b01101, 5),
            -2 => writer.put(0b01100, 5),
            _ => {
                writer.put(0b0111, 4);
                if (value as u32) < LITERAL_ESCAPE {
                    writer.put(value as u32, LITERAL_BITS);
                } else {
                    writer.put(LITERAL_ESCAPE, LITERAL_BITS);
                    writer.put(value as u32, 16);
                }
            }
        }
        last = value;
    }
    flush_run(&mut writer, &mut run);

    writer.finish()
}

fn flush_run(writer: &mut BitWriter, run: &mut usize) {
    while *run > 0 {
        if *run < MIN_RUN {
            // 2 bits per repeat
            writer.put(0, (*run * 2) as u8);
            *run = 0;
        } else {
            let chunk = (*run).min(MAX_RUN);
            writer.put(0b010, 3);
            writer.put((chunk - MIN_RUN) as u32, 5);
            *run -= chunk;
        }
    }
}

/// Decode exactly `count` samples from a packed bitstream
///
/// # Errors
/// `CorruptStream` if the stream ends early or a run overshoots `count`
pub fn decode(data: &[u8], count: usize) -> Result<Vec<u16>> {
    let mut out = Vec::new();
    out.try_reserve_exact(count)
        .map_err(|_| ContractError::AllocationFailure {
            bytes: (count as u64).saturating_mul(2),
        })?;

    let mut reader = BitReader::new(data);
    let mut last: u16 = 0;

    while out.len() < count {
        let decoded = out.len();
        let mut next = |nbits: u8| {
            reader.get(nbits).ok_or_else(|| {
                ContractError::corrupt_stream(format!(
                    "occi bitstream ended after {decoded} of {count} samples"
                ))
            })
        };

        match next(2)? {
            0b00 => {}
            0b11 => last = last.wrapping_add(1),
            0b10 => last = last.wrapping_sub(1),
            _ => {
                if next(1)? == 0 {
                    let run = next(5)? as usize + MIN_RUN;
                    if decoded + run > count {
                        return Err(ContractError::corrupt_stream(format!(
                            "occi run of {run} at sample {decoded} exceeds {count} samples"
                        )));
                    }
                    out.resize(decoded + run, last);
                    continue;
                }
                if next(1)? == 0 {
                    last = if next(1)? == 1 {
                        last.wrapping_add(2)
                    } else {
                        last.wrapping_sub(2)
                    };
                } else {
                    let literal = next(LITERAL_BITS)?;
                    last = if literal == LITERAL_ESCAPE {
                        next(16)? as u16
                    } else {
                        literal as u16
                    };
                }
            }
        }
        out.push(last);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_code_layout() {
        // 1 (+1), 1 (repeat), 3 (+2), 2 (-1)
        let bytes = encode(&[1, 1, 3, 2]);
        // 11 00 01101 10 -> 1100_0110 1100_0000
        assert_eq!(bytes, vec![0b1100_0110, 0b1100_0000]);
        assert_eq!(decode(&bytes, 4).unwrap(), vec![1, 1, 3, 2]);
    }

    #[test]
    fn test_runs_of_every_length() {
        for len in 1..=80usize {
            let mut samples = vec![500u16];
            samples.extend(std::iter::repeat(500).take(len));
            samples.push(0);
            let bytes = encode(&samples);
            assert_eq!(decode(&bytes, samples.len()).unwrap(), samples, "run {len}");
        }
    }

    #[test]
    fn test_long_zero_run_is_compact() {
        let samples = vec![0u16; 36];
        // a single 010 + 5-bit code
        assert_eq!(encode(&samples).len(), 1);
    }

    #[test]
    fn test_full_range_literals() {
        let samples = vec![0x7FE, 0x7FF, 0x800, u16::MAX, 0, 65534, 12];
        let bytes = encode(&samples);
        assert_eq!(decode(&bytes, samples.len()).unwrap(), samples);
    }

    #[test]
    fn test_random_depth_roundtrip() {
        let mut rng = rand::rng();
        let mut samples = Vec::with_capacity(4096);
        let mut value: i32 = 1200;
        for _ in 0..4096 {
            match rng.random_range(0..10) {
                0 => value = rng.random_range(0..=u16::MAX as i32),
                1..=5 => {}
                _ => value = (value + rng.random_range(-2..=2)).clamp(0, u16::MAX as i32),
            }
            samples.push(value as u16);
        }
        let bytes = encode(&samples);
        assert!(bytes.len() < samples.len() * 2);
        assert_eq!(decode(&bytes, samples.len()).unwrap(), samples);
    }

    #[test]
    fn test_truncated_stream() {
        let samples: Vec<u16> = (0..64).map(|i| i * 100).collect();
        let mut bytes = encode(&samples);
        bytes.truncate(bytes.len() / 2);
        let err = decode(&bytes, samples.len()).unwrap_err();
        assert!(matches!(err, ContractError::CorruptStream { .. }));
    }

    #[test]
    fn test_run_overshoot_rejected() {
        let bytes = encode(&[0u16; 10]);
        let err = decode(&bytes, 6).unwrap_err();
        assert!(matches!(err, ContractError::CorruptStream { .. }));
    }
}
