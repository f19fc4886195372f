use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Characters used in room codes. Ambiguous ones are left out.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub fn random_string(length: usize) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| rng.sample(Alphanumeric) as char)
        .take(length)
        .collect()
}

/// Generates a join code for a room
pub fn random_room_code(length: usize) -> String {
    let mut rng = thread_rng();

    (0..length)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}
