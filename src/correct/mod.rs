//! Multiple testing correction.

pub mod bh;

pub use bh::{
    bh_adjust, correct_associations, correct_bh, AssociationStrength, BhCorrected,
    CorrectedAssociation,
};
