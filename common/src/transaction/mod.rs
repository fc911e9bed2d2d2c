use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

use crate::crypto::{Hash, Keypair, Pubkey, Signature};
use crate::instruction::Instruction;
use crate::serializer::Writer;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Missing signer for {0}")]
    MissingSigner(Pubkey),

    #[error("Account {0} not found in message")]
    UnknownAccount(Pubkey),

    #[error("Too many accounts in message: {0}")]
    TooManyAccounts(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed: u8,
    pub num_readonly_unsigned: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub account_indexes: Vec<u8>,
    pub data: Vec<u8>,
}

/// A compiled legacy message: deduplicated account table ordered by
/// access class, recent blockhash and index-compiled instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: Hash,
    pub instructions: Vec<CompiledInstruction>,
}

// Access flags accumulated per account while compiling
#[derive(Default, Clone, Copy)]
struct Access {
    signer: bool,
    writable: bool,
}

impl Message {
    /// Compile `instructions` into a message paid for by `payer`.
    ///
    /// Account ordering: payer first, then writable signers, readonly
    /// signers, writable non-signers, readonly non-signers (programs
    /// included), each class in first-seen order.
    pub fn compile(
        payer: &Pubkey,
        instructions: &[Instruction],
        recent_blockhash: Hash,
    ) -> Result<Self, TransactionError> {
        let mut order: Vec<Pubkey> = Vec::new();
        let mut access: Vec<Access> = Vec::new();

        let mut touch = |key: &Pubkey, signer: bool, writable: bool| {
            let index = match order.iter().position(|k| k == key) {
                Some(index) => index,
                None => {
                    order.push(*key);
                    access.push(Access::default());
                    order.len() - 1
                }
            };
            access[index].signer |= signer;
            access[index].writable |= writable;
        };

        touch(payer, true, true);
        for instruction in instructions {
            for meta in &instruction.accounts {
                touch(&meta.pubkey, meta.is_signer, meta.is_writable);
            }
            touch(&instruction.program_id, false, false);
        }

        if order.len() > u8::MAX as usize {
            return Err(TransactionError::TooManyAccounts(order.len()));
        }

        let class = |a: &Access| match (a.signer, a.writable) {
            (true, true) => 0u8,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        };

        let mut account_keys: Vec<Pubkey> = Vec::with_capacity(order.len());
        for wanted in 0..4u8 {
            for (key, a) in order.iter().zip(access.iter()) {
                if class(a) == wanted {
                    account_keys.push(*key);
                }
            }
        }

        let num_required_signatures = access.iter().filter(|a| a.signer).count() as u8;
        let num_readonly_signed = access.iter().filter(|a| a.signer && !a.writable).count() as u8;
        let num_readonly_unsigned =
            access.iter().filter(|a| !a.signer && !a.writable).count() as u8;

        let index_of = |key: &Pubkey| -> Result<u8, TransactionError> {
            account_keys
                .iter()
                .position(|k| k == key)
                .map(|i| i as u8)
                .ok_or(TransactionError::UnknownAccount(*key))
        };

        let mut compiled = Vec::with_capacity(instructions.len());
        for instruction in instructions {
            let mut account_indexes = Vec::with_capacity(instruction.accounts.len());
            for meta in &instruction.accounts {
                account_indexes.push(index_of(&meta.pubkey)?);
            }
            compiled.push(CompiledInstruction {
                program_id_index: index_of(&instruction.program_id)?,
                account_indexes,
                data: instruction.data.clone(),
            });
        }

        Ok(Self {
            header: MessageHeader {
                num_required_signatures,
                num_readonly_signed,
                num_readonly_unsigned,
            },
            account_keys,
            recent_blockhash,
            instructions: compiled,
        })
    }

    /// Serialize to the legacy wire layout. This is the byte sequence
    /// that gets signed.
    pub fn serialize(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.write_u8(self.header.num_required_signatures);
        writer.write_u8(self.header.num_readonly_signed);
        writer.write_u8(self.header.num_readonly_unsigned);

        writer.write_shortvec_len(self.account_keys.len());
        for key in &self.account_keys {
            writer.write_pubkey(key);
        }

        writer.write_bytes(self.recent_blockhash.as_bytes());

        writer.write_shortvec_len(self.instructions.len());
        for instruction in &self.instructions {
            writer.write_u8(instruction.program_id_index);
            writer.write_shortvec_len(instruction.account_indexes.len());
            writer.write_bytes(&instruction.account_indexes);
            writer.write_shortvec_len(instruction.data.len());
            writer.write_bytes(&instruction.data);
        }

        writer.into_bytes()
    }
}

/// A message plus its signature slots, one per required signer.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub signatures: Vec<Signature>,
    pub message: Message,
}

impl Transaction {
    /// Wrap a message with placeholder signatures. Suitable for
    /// simulation, which skips signature verification.
    pub fn new_unsigned(message: Message) -> Self {
        let signatures =
            vec![Signature::zero(); message.header.num_required_signatures as usize];
        Self {
            signatures,
            message,
        }
    }

    /// Sign the message with every required signer. Fails if a required
    /// signer has no matching keypair.
    pub fn sign(&mut self, signers: &[&Keypair]) -> Result<(), TransactionError> {
        let message_bytes = self.message.serialize();
        let required = self.message.header.num_required_signatures as usize;
        for (slot, key) in self.message.account_keys[..required].iter().enumerate() {
            let keypair = signers
                .iter()
                .find(|kp| kp.pubkey() == *key)
                .ok_or(TransactionError::MissingSigner(*key))?;
            self.signatures[slot] = keypair.sign(&message_bytes);
        }
        Ok(())
    }

    /// The signature that identifies this transaction (the payer's).
    pub fn signature(&self) -> Option<&Signature> {
        self.signatures.first()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.write_shortvec_len(self.signatures.len());
        for signature in &self.signatures {
            writer.write_bytes(signature.as_bytes());
        }
        writer.write_bytes(&self.message.serialize());
        writer.into_bytes()
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.serialize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{system, AccountMeta};

    fn blockhash() -> Hash {
        Hash::new([7; 32])
    }

    #[test]
    fn test_compile_orders_accounts_by_class() {
        let payer = Keypair::generate();
        let to = Pubkey::new([2; 32]);
        let ix = system::transfer(&payer.pubkey(), &to, 100);
        let message = Message::compile(&payer.pubkey(), &[ix], blockhash()).unwrap();

        assert_eq!(message.header.num_required_signatures, 1);
        assert_eq!(message.header.num_readonly_signed, 0);
        // system program is the only readonly unsigned account
        assert_eq!(message.header.num_readonly_unsigned, 1);
        assert_eq!(message.account_keys[0], payer.pubkey());
        assert_eq!(message.account_keys[1], to);
        assert_eq!(
            message.account_keys[2],
            *crate::config::SYSTEM_PROGRAM_ID
        );
    }

    #[test]
    fn test_compile_merges_duplicate_accounts() {
        let payer = Keypair::generate();
        let to = Pubkey::new([2; 32]);
        let ix1 = system::transfer(&payer.pubkey(), &to, 100);
        let ix2 = system::transfer(&payer.pubkey(), &to, 200);
        let message = Message::compile(&payer.pubkey(), &[ix1, ix2], blockhash()).unwrap();

        // payer, to, system program: no duplicates
        assert_eq!(message.account_keys.len(), 3);
        assert_eq!(message.instructions.len(), 2);
        assert_eq!(message.instructions[0].program_id_index, 2);
    }

    #[test]
    fn test_readonly_signer_flag_upgrade() {
        // the same account readonly in one instruction and writable in
        // another must end up writable
        let payer = Keypair::generate();
        let shared = Pubkey::new([5; 32]);
        let program = Pubkey::new([6; 32]);
        let ix1 = crate::instruction::Instruction::new(
            program,
            vec![AccountMeta::readonly(shared, false)],
            vec![],
        );
        let ix2 = crate::instruction::Instruction::new(
            program,
            vec![AccountMeta::writable(shared, false)],
            vec![],
        );
        let message = Message::compile(&payer.pubkey(), &[ix1, ix2], blockhash()).unwrap();
        let index = message
            .account_keys
            .iter()
            .position(|k| *k == shared)
            .unwrap();
        // writable non-signers sit before the readonly tail
        let writable_end = message.account_keys.len()
            - message.header.num_readonly_unsigned as usize;
        assert!(index < writable_end);
    }

    #[test]
    fn test_sign_fills_all_slots() {
        let payer = Keypair::generate();
        let to = Pubkey::new([2; 32]);
        let ix = system::transfer(&payer.pubkey(), &to, 100);
        let message = Message::compile(&payer.pubkey(), &[ix], blockhash()).unwrap();
        let mut tx = Transaction::new_unsigned(message);

        tx.sign(&[&payer]).unwrap();
        assert_eq!(tx.signatures.len(), 1);
        assert_ne!(tx.signatures[0], Signature::zero());
    }

    #[test]
    fn test_sign_missing_signer_fails() {
        let payer = Keypair::generate();
        let other = Keypair::generate();
        let to = Pubkey::new([2; 32]);
        let ix = system::transfer(&payer.pubkey(), &to, 100);
        let message = Message::compile(&payer.pubkey(), &[ix], blockhash()).unwrap();
        let mut tx = Transaction::new_unsigned(message);

        let err = tx.sign(&[&other]).unwrap_err();
        assert_eq!(err, TransactionError::MissingSigner(payer.pubkey()));
    }

    #[test]
    fn test_wire_layout() {
        let payer = Keypair::generate();
        let to = Pubkey::new([2; 32]);
        let ix = system::transfer(&payer.pubkey(), &to, 100);
        let message = Message::compile(&payer.pubkey(), &[ix], blockhash()).unwrap();
        let mut tx = Transaction::new_unsigned(message);
        tx.sign(&[&payer]).unwrap();

        let bytes = tx.serialize();
        // shortvec sig count, one 64-byte signature, then the message
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..65], tx.signatures[0].as_bytes());
        // message header starts right after the signatures
        assert_eq!(bytes[65], 1); // num_required_signatures
        assert_eq!(bytes[66], 0); // num_readonly_signed
        assert_eq!(bytes[67], 1); // num_readonly_unsigned
        assert_eq!(bytes[68], 3); // account count

        // base64 wire form decodes back to the same bytes
        use base64::Engine;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(tx.to_base64())
            .unwrap();
        assert_eq!(decoded, bytes);
    }
}
