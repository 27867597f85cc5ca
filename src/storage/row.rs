//! # Row Codec
//!
//! A row is a fixed-size record: `id` (the primary key), a username of up to
//! 31 bytes and an email of up to 254 bytes. Strings are stored null-terminated
//! in fixed-width fields so every row serializes to exactly [`ROW_SIZE`] bytes
//! and rows never cross page boundaries.

use std::fmt;

pub const COLUMN_USERNAME_SIZE: usize = 32;
pub const COLUMN_EMAIL_SIZE: usize = 255;

pub const ID_SIZE: usize = std::mem::size_of::<u32>();
pub const ID_OFFSET: usize = 0;
pub const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
pub const EMAIL_OFFSET: usize = USERNAME_OFFSET + COLUMN_USERNAME_SIZE;

/// On-disk size of a serialized row: id + username + email, no padding.
pub const ROW_SIZE: usize = ID_SIZE + COLUMN_USERNAME_SIZE + COLUMN_EMAIL_SIZE;

/// Copies a string into a fixed-width, null-terminated field.
///
/// Input longer than `N - 1` bytes is truncated; the final byte is always NUL.
pub fn str_to_fixed_bytes<const N: usize>(input: &str) -> [u8; N] {
    let mut buf = [0u8; N];
    let bytes = input.as_bytes();
    let len = bytes.len().min(N - 1);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

fn fixed_bytes_to_string(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: u32,
    username: [u8; COLUMN_USERNAME_SIZE],
    email: [u8; COLUMN_EMAIL_SIZE],
}

impl Row {
    pub fn new(id: u32, username: &str, email: &str) -> Self {
        Row {
            id,
            username: str_to_fixed_bytes(username),
            email: str_to_fixed_bytes(email),
        }
    }

    pub fn username(&self) -> String {
        fixed_bytes_to_string(&self.username)
    }

    pub fn email(&self) -> String {
        fixed_bytes_to_string(&self.email)
    }

    /// Writes the row into `dest`, which must be at least [`ROW_SIZE`] bytes.
    pub fn serialize(&self, dest: &mut [u8]) {
        dest[ID_OFFSET..ID_OFFSET + ID_SIZE].copy_from_slice(&self.id.to_le_bytes());
        dest[USERNAME_OFFSET..USERNAME_OFFSET + COLUMN_USERNAME_SIZE]
            .copy_from_slice(&self.username);
        dest[EMAIL_OFFSET..EMAIL_OFFSET + COLUMN_EMAIL_SIZE].copy_from_slice(&self.email);
    }

    /// Reads a row back from `src`. Never fails: the layout is fixed and any
    /// [`ROW_SIZE`] bytes decode to some row.
    pub fn deserialize(src: &[u8]) -> Self {
        let mut id_bytes = [0u8; ID_SIZE];
        id_bytes.copy_from_slice(&src[ID_OFFSET..ID_OFFSET + ID_SIZE]);

        let mut username = [0u8; COLUMN_USERNAME_SIZE];
        username.copy_from_slice(&src[USERNAME_OFFSET..USERNAME_OFFSET + COLUMN_USERNAME_SIZE]);

        let mut email = [0u8; COLUMN_EMAIL_SIZE];
        email.copy_from_slice(&src[EMAIL_OFFSET..EMAIL_OFFSET + COLUMN_EMAIL_SIZE]);

        Row {
            id: u32::from_le_bytes(id_bytes),
            username,
            email,
        }
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.id, self.email(), self.username())
    }
}
