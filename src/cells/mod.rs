//! # Recurrent Cells
//!
//! Single-position cells scanned by the multi-dimensional layers in
//! [`crate::rnn`].
//!
//! ## Tensor Shapes
//!
//! | Tensor | Shape | Description |
//! |--------|-------|-------------|
//! | `input` | `[batch, input_size]` | Features at one position |
//! | `projected` | `[batch, 3 * hidden_size]` | Output of [`GruCell::project_input`] |
//! | `hidden` | `[batch, hidden_size]` | Previous hidden state |
//!
//! [`GruCell::project_input`] also accepts whole lines `[batch, len, input_size]`,
//! which is how [`MdRnn`](crate::rnn::MdRnn) uses it.

pub mod gru_cell;

pub use gru_cell::GruCell;
