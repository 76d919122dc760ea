use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use printlink_protocol::constants::MAX_CHUNK_SIZE;
use printlink_protocol::{ChunkEnvelope, Destination};

use crate::TransferError;

// ---------------------------------------------------------------------------
// Payload encoding
// ---------------------------------------------------------------------------

/// Encodes raw bytes as standard padded base64.
pub fn encode_payload(raw: &[u8]) -> String {
    STANDARD.encode(raw)
}

/// Inverse of [`encode_payload`].
pub fn decode_payload(text: &str) -> Result<Vec<u8>, TransferError> {
    Ok(STANDARD.decode(text)?)
}

// ---------------------------------------------------------------------------
// Slicing
// ---------------------------------------------------------------------------

fn check_chunk_size(chunk_size: usize) -> Result<(), TransferError> {
    if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
        return Err(TransferError::InvalidChunkSize {
            got: chunk_size,
            max: MAX_CHUNK_SIZE,
        });
    }
    Ok(())
}

/// Number of chunks a payload of `total` bytes splits into (1 for empty).
pub fn chunk_count(total: usize, chunk_size: usize) -> usize {
    if total == 0 {
        1
    } else {
        total.div_ceil(chunk_size)
    }
}

/// Splits `raw` into slices of `chunk_size` bytes; only the last may be
/// shorter. Empty input yields exactly one empty slice.
pub fn split(raw: &[u8], chunk_size: usize) -> Result<Vec<&[u8]>, TransferError> {
    check_chunk_size(chunk_size)?;
    if raw.is_empty() {
        return Ok(vec![raw]);
    }
    Ok(raw.chunks(chunk_size).collect())
}

// ---------------------------------------------------------------------------
// ChunkPlan
// ---------------------------------------------------------------------------

/// Describes how one file is cut into envelopes.
///
/// Envelopes are produced lazily by [`ChunkPlan::envelopes`], so only one
/// slice is base64-encoded at a time.
#[derive(Debug, Clone)]
pub struct ChunkPlan<'a> {
    transfer_id: String,
    filename: String,
    destination: Destination,
    data: &'a [u8],
    chunk_size: usize,
}

impl<'a> ChunkPlan<'a> {
    pub fn new(
        transfer_id: &str,
        filename: &str,
        destination: Destination,
        data: &'a [u8],
        chunk_size: usize,
    ) -> Result<Self, TransferError> {
        check_chunk_size(chunk_size)?;
        let count = chunk_count(data.len(), chunk_size);
        if u32::try_from(count).is_err() {
            return Err(TransferError::TooManyChunks(count));
        }
        Ok(Self {
            transfer_id: transfer_id.to_string(),
            filename: filename.to_string(),
            destination,
            data,
            chunk_size,
        })
    }

    pub fn chunk_count(&self) -> usize {
        chunk_count(self.data.len(), self.chunk_size)
    }

    pub fn total_size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn envelopes(&self) -> Envelopes<'_> {
        Envelopes {
            plan: self,
            index: 0,
            offset: 0,
            finished: false,
        }
    }
}

/// Iterator over the envelopes of a [`ChunkPlan`], in index order.
pub struct Envelopes<'p> {
    plan: &'p ChunkPlan<'p>,
    index: u32,
    offset: usize,
    finished: bool,
}

impl Iterator for Envelopes<'_> {
    type Item = ChunkEnvelope;

    fn next(&mut self) -> Option<ChunkEnvelope> {
        if self.finished {
            return None;
        }

        let plan = self.plan;
        let end = (self.offset + plan.chunk_size).min(plan.data.len());
        let slice = &plan.data[self.offset..end];
        let payload = encode_payload(slice);
        let len = slice.len() as u64;

        let envelope = if self.index == 0 {
            ChunkEnvelope::first(
                &plan.transfer_id,
                &plan.filename,
                plan.total_size(),
                plan.destination,
                payload,
                len,
            )
        } else {
            ChunkEnvelope::next(&plan.transfer_id, self.index, payload, len)
        };

        self.index += 1;
        self.offset = end;
        self.finished = self.offset >= plan.data.len();
        Some(envelope)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.finished {
            0
        } else {
            self.plan.chunk_count() - self.index as usize
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Envelopes<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(n: usize) -> Vec<u8> {
        (0..n).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn encode_decode_inverse() {
        let raw = pattern(1000);
        let text = encode_payload(&raw);
        assert!(text.is_ascii());
        assert_eq!(decode_payload(&text).unwrap(), raw);
        assert_eq!(encode_payload(b""), "");
        assert_eq!(encode_payload(b"\x00\x01\x02"), "AAEC");
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode_payload("not base64!"),
            Err(TransferError::Decode(_))
        ));
    }

    #[test]
    fn split_reassembles_for_many_sizes() {
        for n in [0usize, 1, 2, 31, 32, 33, 64, 100, 1000] {
            for size in [1usize, 3, 32, 1024] {
                let raw = pattern(n);
                let slices = split(&raw, size).unwrap();
                assert_eq!(slices.len(), chunk_count(n, size), "n={n} size={size}");
                assert_eq!(slices.concat(), raw);
                let (last, rest) = slices.split_last().unwrap();
                assert!(rest.iter().all(|s| s.len() == size));
                assert!(last.len() <= size);
                if n > 0 {
                    assert!(!last.is_empty());
                }
            }
        }
    }

    #[test]
    fn split_empty_yields_one_empty_slice() {
        let slices = split(b"", 32).unwrap();
        assert_eq!(slices.len(), 1);
        assert!(slices[0].is_empty());
    }

    #[test]
    fn split_rejects_zero_chunk_size() {
        assert!(matches!(
            split(b"abc", 0),
            Err(TransferError::InvalidChunkSize { got: 0, .. })
        ));
        assert!(ChunkPlan::new("t", "f", Destination::Local, b"abc", 0).is_err());
        assert!(ChunkPlan::new("t", "f", Destination::Local, b"abc", MAX_CHUNK_SIZE + 1).is_err());
    }

    #[test]
    fn plan_for_100k_file() {
        let raw = pattern(100_000);
        let plan = ChunkPlan::new("t1", "part.gcode", Destination::Sdcard, &raw, 32_768).unwrap();
        assert_eq!(plan.chunk_count(), 4);

        let envelopes: Vec<_> = plan.envelopes().collect();
        assert_eq!(envelopes.len(), 4);
        let indices: Vec<u32> = envelopes.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);

        let first = &envelopes[0];
        assert_eq!(first.filename.as_deref(), Some("part.gcode"));
        assert_eq!(first.total_size, Some(100_000));
        assert_eq!(first.destination, Some(Destination::Sdcard));
        assert!(envelopes[1..].iter().all(|e| e.filename.is_none()
            && e.total_size.is_none()
            && e.destination.is_none()));

        assert_eq!(envelopes[3].payload_length, 1_696);
        let rebuilt: Vec<u8> = envelopes
            .iter()
            .flat_map(|e| decode_payload(&e.payload).unwrap())
            .collect();
        assert_eq!(rebuilt, raw);
    }

    #[test]
    fn plan_for_empty_file() {
        let plan = ChunkPlan::new("t0", "empty.gcode", Destination::Local, b"", 32).unwrap();
        let mut it = plan.envelopes();
        assert_eq!(it.len(), 1);
        let only = it.next().unwrap();
        assert_eq!(only.index, 0);
        assert_eq!(only.payload, "");
        assert_eq!(only.payload_length, 0);
        assert_eq!(only.total_size, Some(0));
        assert!(it.next().is_none());
    }

    #[test]
    fn envelopes_size_hint_tracks_progress() {
        let raw = pattern(10);
        let plan = ChunkPlan::new("t", "f", Destination::Local, &raw, 4).unwrap();
        let mut it = plan.envelopes();
        assert_eq!(it.len(), 3);
        it.next();
        assert_eq!(it.len(), 2);
        it.next();
        it.next();
        assert_eq!(it.len(), 0);
        assert!(it.next().is_none());
    }
}
