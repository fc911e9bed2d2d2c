mod hash;
mod keypair;
mod pda;
mod pubkey;

pub use hash::{sha256, sha256_hex, Hash, HASH_SIZE};
pub use keypair::{Keypair, KeypairError, Signature, KEYPAIR_SIZE, SIGNATURE_SIZE};
pub use pda::{create_program_address, find_program_address, is_on_curve, PdaError, MAX_SEEDS, MAX_SEED_LEN};
pub use pubkey::{Pubkey, PubkeyError, PUBKEY_SIZE};
