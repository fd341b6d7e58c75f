//! Scheduling XOR block requests across a set of privacy-threshold mirrors.
//!
//! [`RequestorState`] picks `privacy_threshold` mirrors at random out of
//! whatever set is offered, hands out one correlated XOR request per block
//! per active mirror, and reconstructs each block once all
//! `privacy_threshold` shares for it have come back. If an active mirror
//! fails, its *slot* (not the mirror itself) is handed to a mirror drawn
//! from the reserve pool and the same outstanding work continues under that
//! slot — callers never need to recompute bitstrings on a mirror swap.
//!
//! The mirror identity type `M` is a caller-supplied generic so this crate
//! has no knowledge of how mirrors are addressed or contacted; it only
//! needs to compare two mirror identities for equality.

mod error;

pub use error::RequestorError;

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::RngCore;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};
use uppir_bitstring::Bitstring;
use uppir_manifest::{HashAlgorithm, HashValue, Manifest};

/// One unit of outstanding work: retrieve the XOR of the blocks selected by
/// `bitstring` from `mirror`, on behalf of `block_num`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTuple<M> {
    pub mirror: M,
    pub block_num: usize,
    pub bitstring: Bitstring,
}

struct ActiveSlot<M> {
    mirror: M,
    serving_request: bool,
    blocks_needed: VecDeque<usize>,
    bitstrings: VecDeque<Bitstring>,
}

struct ReturnedShare<M> {
    mirror: M,
    bitstring: Bitstring,
    xorblock: Vec<u8>,
}

struct Inner<M> {
    active: Vec<ActiveSlot<M>>,
    backup: VecDeque<M>,
    returned: HashMap<usize, Vec<ReturnedShare<M>>>,
    finished: HashMap<usize, Vec<u8>>,
}

/// The XOR request scheduler for a single file (or set of blocks) download.
pub struct RequestorState<M> {
    inner: Mutex<Inner<M>>,
    privacy_threshold: usize,
    poll_interval: Duration,
    hash_algorithm: HashAlgorithm,
    block_hashes: Vec<HashValue>,
}

impl<M> RequestorState<M>
where
    M: Clone + PartialEq,
{
    /// Picks `privacy_threshold` mirrors at random from `mirrors`, builds one
    /// correlated bitstring per block for each of them (`privacy_threshold -
    /// 1` random bitstrings XORed together and flipped at the target bit to
    /// produce the last), and keeps the rest of `mirrors` as a reserve pool
    /// for failure recovery.
    pub fn new(
        mirrors: Vec<M>,
        blocklist: Vec<usize>,
        manifest: &Manifest,
        privacy_threshold: usize,
        poll_interval: Duration,
    ) -> Result<Self, RequestorError> {
        if privacy_threshold == 0 {
            return Err(RequestorError::BadArgument(
                "privacy_threshold must be positive".to_string(),
            ));
        }
        if mirrors.len() < privacy_threshold {
            return Err(RequestorError::InsufficientMirrors(format!(
                "requested {} mirrors but only {} were available",
                privacy_threshold,
                mirrors.len()
            )));
        }

        let hash_algorithm = HashAlgorithm::parse(&manifest.hash_algorithm)
            .map_err(|e| RequestorError::BadArgument(e.to_string()))?;

        let mut shuffled = mirrors;
        shuffled.shuffle(&mut OsRng);

        let chosen: Vec<M> = shuffled[..privacy_threshold].to_vec();
        let backup: VecDeque<M> = shuffled[privacy_threshold..].iter().cloned().collect();

        let bitstring_len = Bitstring::length_for(manifest.block_count);

        // privacy_threshold - 1 mirrors get independently random bitstrings
        // per block; the last mirror's bitstring is derived so the XOR of
        // all privacy_threshold bitstrings for a block is the unit vector
        // selecting exactly that block. No single mirror's bitstring alone
        // reveals which block is wanted.
        let mut per_mirror_bitstrings: Vec<Vec<Bitstring>> =
            vec![Vec::with_capacity(blocklist.len()); privacy_threshold];

        for &block_num in &blocklist {
            let mut accumulated = Bitstring::zeroed(manifest.block_count);
            for slot in per_mirror_bitstrings.iter_mut().take(privacy_threshold - 1) {
                let mut bytes = vec![0u8; bitstring_len];
                OsRng.fill_bytes(&mut bytes);
                let mut random_bitstring = Bitstring::from_bytes(bytes);
                random_bitstring.clear_padding(manifest.block_count);
                accumulated = accumulated
                    .xor(&random_bitstring)
                    .map_err(|e| RequestorError::InternalError(e.to_string()))?;
                slot.push(random_bitstring);
            }

            let derived = accumulated
                .flip(block_num)
                .map_err(|e| RequestorError::BadArgument(e.to_string()))?;
            per_mirror_bitstrings[privacy_threshold - 1].push(derived);
        }

        let active = chosen
            .into_iter()
            .zip(per_mirror_bitstrings)
            .map(|(mirror, bitstrings)| ActiveSlot {
                mirror,
                serving_request: false,
                blocks_needed: blocklist.iter().copied().collect(),
                bitstrings: bitstrings.into(),
            })
            .collect();

        let mut returned = HashMap::with_capacity(blocklist.len());
        for block_num in &blocklist {
            returned.insert(*block_num, Vec::new());
        }

        Ok(Self {
            inner: Mutex::new(Inner {
                active,
                backup,
                returned,
                finished: HashMap::new(),
            }),
            privacy_threshold,
            poll_interval,
            hash_algorithm,
            block_hashes: manifest.block_hashes.clone(),
        })
    }

    /// Returns the next request a caller should send, blocking (via sleeping
    /// in `poll_interval` increments) while every active slot is currently
    /// serving a request but work remains. Returns `None` once every block
    /// has been retrieved.
    pub async fn next_request(&self) -> Option<RequestTuple<M>> {
        loop {
            let mut inner = self.inner.lock().await;

            let mut still_serving = false;
            for slot in inner.active.iter_mut() {
                if slot.serving_request {
                    still_serving = true;
                    continue;
                }
                if slot.blocks_needed.is_empty() {
                    continue;
                }

                slot.serving_request = true;
                return Some(RequestTuple {
                    mirror: slot.mirror.clone(),
                    block_num: slot.blocks_needed[0],
                    bitstring: slot.bitstrings[0].clone(),
                });
            }

            if !still_serving {
                return None;
            }

            drop(inner);
            sleep(self.poll_interval).await;
        }
    }

    /// Records that `mirror` failed to answer `request` and substitutes a
    /// mirror from the reserve pool into that slot. The slot's outstanding
    /// work (blocks needed, bitstrings) is untouched; only the mirror
    /// identity backing it changes.
    pub async fn notify_failure(&self, request: &RequestTuple<M>) -> Result<(), RequestorError> {
        let mut inner = self.inner.lock().await;

        let next_mirror = inner
            .backup
            .pop_front()
            .ok_or_else(|| RequestorError::InsufficientMirrors("no replacement mirrors remain".to_string()))?;

        let slot = inner
            .active
            .iter_mut()
            .find(|slot| slot.mirror == request.mirror)
            .ok_or_else(|| RequestorError::InternalError("unknown mirror in notify_failure".to_string()))?;

        warn!("substituting failed mirror slot with a reserve mirror");
        slot.mirror = next_mirror;
        slot.serving_request = false;
        Ok(())
    }

    /// Records a successful response. Once `privacy_threshold` shares for a
    /// block have been collected, reconstructs it by XORing them together
    /// and verifies the result against the manifest's block hash.
    pub async fn notify_success(
        &self,
        request: &RequestTuple<M>,
        xorblock: Vec<u8>,
    ) -> Result<(), RequestorError> {
        let mut inner = self.inner.lock().await;

        let slot_index = inner
            .active
            .iter()
            .position(|slot| slot.mirror == request.mirror)
            .ok_or_else(|| RequestorError::InternalError("unknown mirror in notify_success".to_string()))?;

        let (block_num, bitstring) = {
            let slot = &mut inner.active[slot_index];
            slot.serving_request = false;
            let block_num = slot
                .blocks_needed
                .pop_front()
                .ok_or_else(|| RequestorError::InternalError("slot had no outstanding block".to_string()))?;
            let bitstring = slot
                .bitstrings
                .pop_front()
                .ok_or_else(|| RequestorError::InternalError("slot had no outstanding bitstring".to_string()))?;
            if block_num != request.block_num || bitstring != request.bitstring {
                return Err(RequestorError::InternalError(
                    "request tuple does not match the slot's outstanding request".to_string(),
                ));
            }
            (block_num, bitstring)
        };

        let shares = inner.returned.get_mut(&block_num).ok_or_else(|| {
            RequestorError::InternalError(format!("block {block_num} not tracked by this requestor"))
        })?;
        shares.push(ReturnedShare {
            mirror: request.mirror.clone(),
            bitstring,
            xorblock,
        });

        if shares.len() != self.privacy_threshold {
            return Ok(());
        }

        let shares = inner.returned.remove(&block_num).expect("just checked present");
        let mut result = shares[0].xorblock.clone();
        for share in &shares[1..] {
            for (a, b) in result.iter_mut().zip(share.xorblock.iter()) {
                *a ^= b;
            }
        }

        let expected_hash = self
            .block_hashes
            .get(block_num)
            .ok_or_else(|| RequestorError::InternalError(format!("no manifest hash for block {block_num}")))?;
        let actual_hash = self.hash_algorithm.digest(&result);
        if &actual_hash != expected_hash {
            return Err(RequestorError::CorruptData { block_num });
        }

        debug!(block_num, "reconstructed and verified block");
        inner.finished.insert(block_num, result);
        Ok(())
    }

    /// Returns a previously reconstructed block, removing it from the
    /// finished set. `None` if the block hasn't been fully reconstructed
    /// yet (or was already returned).
    pub async fn return_block(&self, block_num: usize) -> Option<Vec<u8>> {
        self.inner.lock().await.finished.remove(&block_num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uppir_manifest::FileInfo;

    fn manifest_with_blocks(block_count: usize, block_size: usize) -> Manifest {
        let algo = HashAlgorithm::parse("sha256-hex").unwrap();
        let block_hashes: Vec<HashValue> = (0..block_count)
            .map(|i| algo.digest(&vec![i as u8; block_size]))
            .collect();
        let mut manifest = Manifest {
            manifest_version: "1.0".to_string(),
            hash_algorithm: "sha256-hex".to_string(),
            block_size,
            block_count,
            block_hashes,
            vendor_hostname: "vendor.example".to_string(),
            vendor_port: 62293,
            manifest_hash: Default::default(),
            files: vec![FileInfo {
                filename: "f".to_string(),
                hash: algo.digest(b""),
                offset: 0,
                length: 0,
            }],
        };
        manifest.manifest_hash = manifest.compute_manifest_hash().unwrap();
        manifest
    }

    #[tokio::test]
    async fn rejects_too_few_mirrors() {
        let manifest = manifest_with_blocks(4, 64);
        let err = RequestorState::new(
            vec!["a".to_string(), "b".to_string()],
            vec![0],
            &manifest,
            3,
            Duration::from_millis(1),
        )
        .unwrap_err();
        assert!(matches!(err, RequestorError::InsufficientMirrors(_)));
    }

    #[tokio::test]
    async fn full_round_trip_reconstructs_block() {
        let block_size = 64;
        let block_count = 4;
        let manifest = manifest_with_blocks(block_count, block_size);
        let mirrors: Vec<String> = vec!["m0".into(), "m1".into(), "m2".into()];

        let requestor =
            RequestorState::new(mirrors.clone(), vec![2], &manifest, 3, Duration::from_millis(1)).unwrap();

        // Simulate the datastore: block i is filled with byte i.
        let blocks: Vec<Vec<u8>> = (0..block_count as u8).map(|i| vec![i; block_size]).collect();

        let mut outstanding = Vec::new();
        for _ in 0..3 {
            outstanding.push(requestor.next_request().await.unwrap());
        }
        // all three slots are now serving; a fourth poll should see nobody
        // free and nothing finished, i.e. it awaits - we don't call it again
        // here to avoid blocking the test.

        for request in outstanding {
            let xorblock = blocks
                .iter()
                .enumerate()
                .filter(|(i, _)| request.bitstring.get(*i).unwrap() == 1)
                .fold(vec![0u8; block_size], |mut acc, (_, block)| {
                    for (a, b) in acc.iter_mut().zip(block) {
                        *a ^= b;
                    }
                    acc
                });
            requestor.notify_success(&request, xorblock).await.unwrap();
        }

        assert_eq!(requestor.next_request().await, None);
        let result = requestor.return_block(2).await.unwrap();
        assert_eq!(result, blocks[2]);
    }

    #[tokio::test]
    async fn failure_substitutes_reserve_mirror_without_losing_work() {
        let manifest = manifest_with_blocks(2, 64);
        let mirrors: Vec<String> = vec!["m0".into(), "m1".into(), "spare".into()];

        let requestor =
            RequestorState::new(mirrors, vec![0], &manifest, 2, Duration::from_millis(1)).unwrap();

        let first = requestor.next_request().await.unwrap();
        requestor.notify_failure(&first).await.unwrap();

        let retried = requestor.next_request().await.unwrap();
        assert_eq!(retried.block_num, first.block_num);
        assert_eq!(retried.bitstring, first.bitstring);
        assert_ne!(retried.mirror, first.mirror);
    }

    #[tokio::test]
    async fn exhausted_backup_pool_is_insufficient_mirrors() {
        let manifest = manifest_with_blocks(2, 64);
        let mirrors: Vec<String> = vec!["m0".into(), "m1".into()];

        let requestor =
            RequestorState::new(mirrors, vec![0], &manifest, 2, Duration::from_millis(1)).unwrap();

        let request = requestor.next_request().await.unwrap();
        let err = requestor.notify_failure(&request).await.unwrap_err();
        assert!(matches!(err, RequestorError::InsufficientMirrors(_)));
    }
}
