//! Term dictionary enumeration API.
//!
//! Cursors come in two capabilities: every cursor can walk terms in order
//! ([`TermsEnum`]); cursors over a whole field can also seek
//! ([`SeekTermsEnum`]). An automaton intersection only walks, so seeking it
//! is a compile-time error rather than a runtime one.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::postings::BlockTermState;

/// Outcome of [`SeekTermsEnum::seek_ceil`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeekStatus {
    /// The cursor is on the target term.
    Found,
    /// The cursor is on the smallest term greater than the target.
    NotFound,
    /// No term is greater than or equal to the target.
    End,
}

/// Iterator over the terms of a field, in byte order.
///
/// # Example
///
/// ```ignore
/// let mut cursor = reader.field("body").unwrap().iterator();
/// while let Some(term) = cursor.next()? {
///     println!("{}", String::from_utf8_lossy(term));
/// }
/// ```
pub trait TermsEnum {
    /// Postings-codec state carried by each term.
    type State;

    /// Advance to the next term.
    ///
    /// Returns `None` when there are no more terms.
    fn next(&mut self) -> Result<Option<&[u8]>>;

    /// The current term.
    fn term(&self) -> &[u8];

    /// Number of documents containing the current term.
    fn doc_freq(&mut self) -> Result<u32>;

    /// Total occurrences of the current term, or -1 if frequencies are omitted.
    fn total_term_freq(&mut self) -> Result<i64>;

    /// Decoded state of the current term, for a later
    /// [`SeekTermsEnum::seek_exact_with_state`].
    fn term_state(&mut self) -> Result<BlockTermState<Self::State>>;
}

/// A [`TermsEnum`] that can be positioned.
pub trait SeekTermsEnum: TermsEnum {
    /// Position on `target` if it exists.
    ///
    /// On `false` the cursor is not on a term; the following
    /// [`TermsEnum::next`] returns the smallest term greater than `target`.
    fn seek_exact(&mut self, target: &[u8]) -> Result<bool>;

    /// Position on the smallest term greater than or equal to `target`.
    fn seek_ceil(&mut self, target: &[u8]) -> Result<SeekStatus>;

    /// Position on `target` using a state saved from
    /// [`TermsEnum::term_state`], without reading the dictionary.
    fn seek_exact_with_state(&mut self, target: &[u8], state: &BlockTermState<Self::State>);
}

/// Access to the terms of one field.
pub trait Terms {
    /// The seekable cursor type.
    type Cursor<'a>: SeekTermsEnum
    where
        Self: 'a;

    /// A new cursor, positioned before the first term.
    fn iterator(&self) -> Self::Cursor<'_>;

    /// Number of distinct terms.
    fn size(&self) -> u64;

    /// Sum of the document frequencies of all terms.
    fn sum_doc_freq(&self) -> u64;

    /// Sum of the total term frequencies of all terms, or -1 if frequencies
    /// are omitted.
    fn sum_total_term_freq(&self) -> i64;

    /// Number of documents with at least one term in this field.
    fn doc_count(&self) -> u32;

    /// Check if this field has term frequencies stored.
    fn has_freqs(&self) -> bool;

    /// Check if this field has positions stored.
    fn has_positions(&self) -> bool;

    /// Check if this field has offsets stored.
    fn has_offsets(&self) -> bool;

    /// Check if this field has payloads stored.
    fn has_payloads(&self) -> bool;
}
