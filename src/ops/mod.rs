//! tree-level operations on the object store

mod checkout;
mod diff;
mod mtree;
mod prune;

pub use checkout::{checkout_commit, CheckoutMode, CheckoutOptions};
pub use diff::{diff_mtrees, diff_trees};
pub use mtree::{
    write_directory_to_mtree, write_mtree, FilterResult, MutableEntry, MutableTree, TreeFilter,
};
pub use prune::{prune, PruneStats};
