//! Incremental AES-256-GCM.
//!
//! Produces the same bytes as the one-shot `aes_gcm::Aes256Gcm` AEAD with empty
//! associated data, but consumes input in arbitrary-sized chunks so neither
//! direction needs the whole payload in memory.

use aes::{
    cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit, KeyIvInit, StreamCipher},
    Aes256, Block,
};
use ctr::Ctr32BE;
use ghash::{universal_hash::UniversalHash, GHash};

use crate::key_store::KeyStore;

pub(crate) const NONCE_LEN: usize = 12;
pub(crate) const TAG_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

/// Largest plaintext GCM can protect under one nonce (2^39 - 256 bits).
pub(crate) const MAX_PLAINTEXT_LEN: u64 = (1 << 36) - 32;

pub(crate) struct GcmStream {
    ctr: Ctr32BE<Aes256>,
    ghash: GHash,
    tag_mask: Block,
    partial: [u8; BLOCK_LEN],
    partial_len: usize,
    ciphertext_len: u64,
}

impl GcmStream {
    pub(crate) fn new(key: &KeyStore, nonce: &[u8; NONCE_LEN]) -> Self {
        let key = GenericArray::from_slice(key.as_bytes());
        let aes = Aes256::new(key);

        let mut hash_key = Block::default();
        aes.encrypt_block(&mut hash_key);

        let mut j0 = Block::default();
        j0[..NONCE_LEN].copy_from_slice(nonce);
        j0[BLOCK_LEN - 1] = 1;

        let mut tag_mask = j0;
        aes.encrypt_block(&mut tag_mask);

        // Payload keystream starts at inc32(J0).
        let mut counter = j0;
        counter[BLOCK_LEN - 1] = 2;

        Self {
            ctr: Ctr32BE::<Aes256>::new(key, &counter),
            ghash: GHash::new(&hash_key),
            tag_mask,
            partial: [0u8; BLOCK_LEN],
            partial_len: 0,
            ciphertext_len: 0,
        }
    }

    /// Encrypt `buf` in place and fold the ciphertext into the tag.
    pub(crate) fn encrypt_chunk(&mut self, buf: &mut [u8]) {
        self.ctr.apply_keystream(buf);
        self.absorb(buf);
    }

    /// Fold `buf` into the tag, then decrypt it in place.
    pub(crate) fn decrypt_chunk(&mut self, buf: &mut [u8]) {
        self.absorb(buf);
        self.ctr.apply_keystream(buf);
    }

    pub(crate) fn finalize(self) -> [u8; TAG_LEN] {
        let (hash, mask) = self.finish_hash();
        let mut tag = [0u8; TAG_LEN];
        for (i, byte) in tag.iter_mut().enumerate() {
            *byte = hash[i] ^ mask[i];
        }
        tag
    }

    /// Constant-time comparison against the tag read from the blob.
    pub(crate) fn verify(mut self, tag: &[u8; TAG_LEN]) -> bool {
        self.flush_partial();
        self.absorb_lengths();

        let mut expected = Block::default();
        for (i, byte) in expected.iter_mut().enumerate() {
            *byte = tag[i] ^ self.tag_mask[i];
        }
        self.ghash.verify(&expected).is_ok()
    }

    fn finish_hash(mut self) -> (Block, Block) {
        self.flush_partial();
        self.absorb_lengths();
        (self.ghash.finalize(), self.tag_mask)
    }

    // GHASH pads each update to a block boundary, so only whole blocks are
    // handed over until the stream ends.
    fn absorb(&mut self, mut data: &[u8]) {
        self.ciphertext_len += data.len() as u64;

        if self.partial_len > 0 {
            let take = (BLOCK_LEN - self.partial_len).min(data.len());
            self.partial[self.partial_len..self.partial_len + take].copy_from_slice(&data[..take]);
            self.partial_len += take;
            data = &data[take..];
            if self.partial_len < BLOCK_LEN {
                return;
            }
            self.ghash.update(&[Block::clone_from_slice(&self.partial)]);
            self.partial_len = 0;
        }

        let whole = data.len() - data.len() % BLOCK_LEN;
        if whole > 0 {
            self.ghash.update_padded(&data[..whole]);
        }

        let rest = &data[whole..];
        self.partial[..rest.len()].copy_from_slice(rest);
        self.partial_len = rest.len();
    }

    fn flush_partial(&mut self) {
        if self.partial_len > 0 {
            self.ghash.update_padded(&self.partial[..self.partial_len]);
            self.partial_len = 0;
        }
    }

    fn absorb_lengths(&mut self) {
        // len(AAD) is always zero here.
        let mut lengths = [0u8; BLOCK_LEN];
        lengths[8..].copy_from_slice(&(self.ciphertext_len * 8).to_be_bytes());
        self.ghash.update_padded(&lengths);
    }
}
