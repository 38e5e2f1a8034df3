//! Published pre-key bundle

use sealframe_crypto::{IdentityKey, KemPublicKey, PublicKey};
use sealframe_proto::{DeviceId, KyberPreKeyId, PreKeyId, SignedPreKeyId};

/// Keys a device publishes so peers can open sessions while it is offline.
///
/// Bundles arrive from the directory service and are untrusted until the
/// pre-key signatures are checked against the identity key, which session
/// establishment does before using any key.
#[derive(Clone, Debug)]
pub struct PreKeyBundle {
    registration_id: u32,
    device_id: DeviceId,
    pre_key: Option<(PreKeyId, PublicKey)>,
    signed_pre_key_id: SignedPreKeyId,
    signed_pre_key_public: PublicKey,
    signed_pre_key_signature: Vec<u8>,
    identity_key: IdentityKey,
    kyber_pre_key_id: KyberPreKeyId,
    kyber_pre_key_public: KemPublicKey,
    kyber_pre_key_signature: Vec<u8>,
}

impl PreKeyBundle {
    /// Assemble a bundle.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registration_id: u32,
        device_id: DeviceId,
        pre_key: Option<(PreKeyId, PublicKey)>,
        signed_pre_key_id: SignedPreKeyId,
        signed_pre_key_public: PublicKey,
        signed_pre_key_signature: Vec<u8>,
        identity_key: IdentityKey,
        kyber_pre_key_id: KyberPreKeyId,
        kyber_pre_key_public: KemPublicKey,
        kyber_pre_key_signature: Vec<u8>,
    ) -> Self {
        Self {
            registration_id,
            device_id,
            pre_key,
            signed_pre_key_id,
            signed_pre_key_public,
            signed_pre_key_signature,
            identity_key,
            kyber_pre_key_id,
            kyber_pre_key_public,
            kyber_pre_key_signature,
        }
    }

    /// Publisher's registration id.
    pub fn registration_id(&self) -> u32 {
        self.registration_id
    }

    /// Publisher's device id.
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// One-time pre-key id, if one was included.
    pub fn pre_key_id(&self) -> Option<PreKeyId> {
        self.pre_key.map(|(id, _)| id)
    }

    /// One-time pre-key, if one was included.
    pub fn pre_key_public(&self) -> Option<&PublicKey> {
        self.pre_key.as_ref().map(|(_, key)| key)
    }

    /// Signed pre-key id.
    pub fn signed_pre_key_id(&self) -> SignedPreKeyId {
        self.signed_pre_key_id
    }

    /// Signed pre-key.
    pub fn signed_pre_key_public(&self) -> &PublicKey {
        &self.signed_pre_key_public
    }

    /// Identity signature over the signed pre-key.
    pub fn signed_pre_key_signature(&self) -> &[u8] {
        &self.signed_pre_key_signature
    }

    /// Publisher's identity key.
    pub fn identity_key(&self) -> &IdentityKey {
        &self.identity_key
    }

    /// Kyber pre-key id.
    pub fn kyber_pre_key_id(&self) -> KyberPreKeyId {
        self.kyber_pre_key_id
    }

    /// Kyber pre-key.
    pub fn kyber_pre_key_public(&self) -> &KemPublicKey {
        &self.kyber_pre_key_public
    }

    /// Identity signature over the Kyber pre-key.
    pub fn kyber_pre_key_signature(&self) -> &[u8] {
        &self.kyber_pre_key_signature
    }

    /// Whether the signed pre-key signature verifies under the identity key.
    pub fn verify_signed_pre_key(&self) -> bool {
        self.identity_key
            .public_key()
            .verify_signature(&self.signed_pre_key_public.serialize(), &self.signed_pre_key_signature)
    }

    /// Whether the Kyber pre-key signature verifies under the identity key.
    pub fn verify_kyber_pre_key(&self) -> bool {
        self.identity_key
            .public_key()
            .verify_signature(&self.kyber_pre_key_public.serialize(), &self.kyber_pre_key_signature)
    }
}
