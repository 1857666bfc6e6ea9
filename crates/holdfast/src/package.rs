//! Validation packages: chain context shipped to remote validators.

use holdfast_chain::{Chain, ChainSlice, MarshalFlags};
use holdfast_crypto::VerifyingKey;
use holdfast_types::{Dna, Sharing};
use holdfast_wire::Package;

use crate::error::Result;

/// How much of the source chain a validator wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainOpt {
    #[default]
    None,
    Headers,
    Entries,
    Full,
}

impl ChainOpt {
    fn headers(self) -> bool {
        matches!(self, ChainOpt::Headers | ChainOpt::Full)
    }

    fn entries(self) -> bool {
        matches!(self, ChainOpt::Entries | ChainOpt::Full)
    }
}

/// An application's packaging requirement for one action on one entry type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackagingRequest {
    pub chain: ChainOpt,
    /// Restricts the shipped chain to these entry types. Empty means all.
    pub types: Vec<String>,
}

impl PackagingRequest {
    pub fn full() -> Self {
        Self {
            chain: ChainOpt::Full,
            types: Vec::new(),
        }
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }
}

/// Decoded package handed to the application validator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationPackage {
    pub chain: Option<ChainSlice>,
}

/// Builds the package answering `request` from the source chain.
///
/// The DNA is never shipped, and private entries travel as placeholders.
pub fn make_package(chain: &Chain, dna: &Dna, request: &PackagingRequest) -> Result<Package> {
    if request.chain == ChainOpt::None {
        return Ok(Package::default());
    }
    let mut flags = MarshalFlags::OMIT_DNA;
    if !request.chain.headers() {
        flags = flags.union(MarshalFlags::NO_HEADERS);
    }
    if !request.chain.entries() {
        flags = flags.union(MarshalFlags::NO_ENTRIES);
    }
    let private_types: Vec<String> = dna
        .zomes
        .iter()
        .flat_map(|z| z.entries.iter())
        .filter(|d| d.sharing == Sharing::Private)
        .map(|d| d.name.clone())
        .collect();
    let bytes = chain.marshal(flags, &request.types, &private_types)?;
    Ok(Package { chain: Some(bytes) })
}

/// Decodes a shipped package, checking its chain against the source agent's
/// key when headers came with it.
pub fn make_validation_package(
    package: Option<&Package>,
    signer: &VerifyingKey,
) -> Result<ValidationPackage> {
    let Some(bytes) = package.and_then(|p| p.chain.as_deref()) else {
        return Ok(ValidationPackage::default());
    };
    let slice = ChainSlice::unmarshal(bytes)?;
    if slice.has_headers() {
        slice.validate(signer)?;
    }
    Ok(ValidationPackage { chain: Some(slice) })
}
