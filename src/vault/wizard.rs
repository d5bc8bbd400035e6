//! Setup wizard steps: create, restore, verify backup.

use super::{encrypt_mnemonic, generate_mnemonic, normalize, validate_mnemonic, EncryptedMnemonicRecord, VaultError};
use rand::seq::index::sample;
use zeroize::Zeroizing;

/// Freshly created wallet. The phrase is shown once for backup, the record is persisted.
pub struct NewWallet {
    pub mnemonic: Zeroizing<String>,
    pub record: EncryptedMnemonicRecord,
}

pub fn create_wallet(password: &str, word_count: u8) -> Result<NewWallet, VaultError> {
    let mnemonic = Zeroizing::new(generate_mnemonic(word_count)?);
    let record = encrypt_mnemonic(&mnemonic, password)?;
    Ok(NewWallet { mnemonic, record })
}

pub fn restore_wallet(phrase: &str, password: &str) -> Result<EncryptedMnemonicRecord, VaultError> {
    let phrase = Zeroizing::new(normalize(phrase));
    if !validate_mnemonic(&phrase) {
        return Err(VaultError::InvalidMnemonic("checksum or wordlist mismatch".into()));
    }
    encrypt_mnemonic(&phrase, password)
}

/// Word positions (0-based) the user must re-enter to prove the backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupChallenge {
    pub positions: Vec<usize>,
}

impl BackupChallenge {
    pub fn random(word_count: usize, picks: usize) -> Self {
        let mut positions = sample(&mut rand::thread_rng(), word_count, picks.min(word_count)).into_vec();
        positions.sort_unstable();
        Self { positions }
    }
}

/// True when every answer matches the phrase word at the challenged position.
pub fn verify_backup(phrase: &str, challenge: &BackupChallenge, answers: &[String]) -> bool {
    let phrase = normalize(phrase);
    let words: Vec<&str> = phrase.split(' ').collect();
    challenge.positions.len() == answers.len()
        && challenge.positions.iter().zip(answers).all(|(&pos, answer)| {
            words.get(pos).is_some_and(|w| *w == answer.trim().to_lowercase())
        })
}
