//! Chromosomes and insertion-ordered chromosome sets
//!
//! Chromosome ids are dense and assigned in insertion order. The set is
//! immutable once built and is shared by the bin table and the index.

use super::error::ChromosomeError;
use std::collections::HashMap;
use std::fmt;

/// A named sequence with a fixed length
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chromosome {
    id: u32,
    name: String,
    length: u32,
}

impl Chromosome {
    pub fn new(id: u32, name: impl Into<String>, length: u32) -> Self {
        Self {
            id,
            name: name.into(),
            length,
        }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn length(&self) -> u32 {
        self.length
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.length)
    }
}

/// Insertion-ordered set of chromosomes with O(1) lookup by id and by name
#[derive(Debug, Clone, Default)]
pub struct ChromosomeSet {
    chroms: Vec<Chromosome>,
    by_name: HashMap<String, u32>,
}

impl ChromosomeSet {
    /// Build a set from `(name, length)` pairs.
    ///
    /// Fails with [`ChromosomeError::Duplicate`] when a name appears twice.
    pub fn new<I, S>(records: I) -> Result<Self, ChromosomeError>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut set = Self::default();
        for (name, length) in records {
            set.push(name.into(), length)?;
        }
        Ok(set)
    }

    /// Build a set from existing chromosomes, re-assigning ids by position.
    pub fn from_chromosomes<I>(chroms: I) -> Result<Self, ChromosomeError>
    where
        I: IntoIterator<Item = Chromosome>,
    {
        Self::new(chroms.into_iter().map(|c| (c.name, c.length)))
    }

    fn push(&mut self, name: String, length: u32) -> Result<(), ChromosomeError> {
        if name.is_empty() {
            return Err(ChromosomeError::EmptyName);
        }
        if length == 0 {
            return Err(ChromosomeError::ZeroLength(name));
        }
        if let Some(&id) = self.by_name.get(&name) {
            return Err(ChromosomeError::Duplicate {
                size_a: self.chroms[id as usize].length,
                size_b: length,
                name,
            });
        }
        let id = self.chroms.len() as u32;
        self.by_name.insert(name.clone(), id);
        self.chroms.push(Chromosome::new(id, name, length));
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chroms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chroms.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Chromosome> {
        self.chroms.iter()
    }

    pub fn as_slice(&self) -> &[Chromosome] {
        &self.chroms
    }

    pub fn get_by_id(&self, id: u32) -> Option<&Chromosome> {
        self.chroms.get(id as usize)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Chromosome> {
        self.by_name
            .get(name)
            .map(|&id| &self.chroms[id as usize])
    }

    pub fn at(&self, id: u32) -> Result<&Chromosome, ChromosomeError> {
        self.get_by_id(id).ok_or(ChromosomeError::NotFoundById(id))
    }

    pub fn at_name(&self, name: &str) -> Result<&Chromosome, ChromosomeError> {
        self.get_by_name(name)
            .ok_or_else(|| ChromosomeError::NotFoundByName(name.to_string()))
    }

    /// Id of the chromosome called `name`
    pub fn id_of(&self, name: &str) -> Result<u32, ChromosomeError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| ChromosomeError::NotFoundByName(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// True when `chrom` is a member, comparing name and length
    pub fn contains_chromosome(&self, chrom: &Chromosome) -> bool {
        self.get_by_name(chrom.name())
            .map_or(false, |c| c.length == chrom.length)
    }

    /// Length of the longest chromosome name, used to size `chroms/name`
    pub fn longest_name(&self) -> usize {
        self.chroms.iter().map(|c| c.name.len()).max().unwrap_or(0)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.chroms.iter().map(|c| c.name.as_str())
    }

    pub fn lengths(&self) -> impl Iterator<Item = u32> + '_ {
        self.chroms.iter().map(|c| c.length)
    }
}

impl PartialEq for ChromosomeSet {
    fn eq(&self, other: &Self) -> bool {
        self.chroms == other.chroms
    }
}

impl Eq for ChromosomeSet {}

impl<'a> IntoIterator for &'a ChromosomeSet {
    type Item = &'a Chromosome;
    type IntoIter = std::slice::Iter<'a, Chromosome>;

    fn into_iter(self) -> Self::IntoIter {
        self.chroms.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ChromosomeSet {
        ChromosomeSet::new([("chr1", 50001), ("chr2", 25017), ("chr3", 10000)]).unwrap()
    }

    #[test]
    fn test_ids_follow_insertion_order() {
        let chroms = sample();
        assert_eq!(chroms.len(), 3);
        assert_eq!(chroms.id_of("chr1").unwrap(), 0);
        assert_eq!(chroms.id_of("chr3").unwrap(), 2);
        assert_eq!(chroms.at(1).unwrap().name(), "chr2");
        assert_eq!(chroms.at_name("chr2").unwrap().length(), 25017);
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = ChromosomeSet::new([("chr1", 10), ("chr2", 5), ("chr1", 20)]).unwrap_err();
        assert_eq!(
            err,
            ChromosomeError::Duplicate {
                name: "chr1".into(),
                size_a: 10,
                size_b: 20
            }
        );
    }

    #[test]
    fn test_missing_lookups() {
        let chroms = sample();
        assert!(chroms.get_by_name("chrX").is_none());
        assert!(chroms.get_by_id(3).is_none());
        assert_eq!(chroms.at(7).unwrap_err(), ChromosomeError::NotFoundById(7));
        assert!(!chroms.contains("chrX"));
        assert!(!chroms.contains_chromosome(&Chromosome::new(0, "chr1", 1)));
        assert!(chroms.contains_chromosome(&Chromosome::new(0, "chr1", 50001)));
    }

    #[test]
    fn test_equality_is_ordered() {
        let a = ChromosomeSet::new([("chr1", 10), ("chr2", 5)]).unwrap();
        let b = ChromosomeSet::new([("chr2", 5), ("chr1", 10)]).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_empty_set() {
        let chroms = ChromosomeSet::new(Vec::<(String, u32)>::new()).unwrap();
        assert!(chroms.is_empty());
        assert_eq!(chroms.longest_name(), 0);
    }

    #[test]
    fn test_invalid_records() {
        assert_eq!(
            ChromosomeSet::new([("", 10)]).unwrap_err(),
            ChromosomeError::EmptyName
        );
        assert!(matches!(
            ChromosomeSet::new([("chr1", 0)]).unwrap_err(),
            ChromosomeError::ZeroLength(_)
        ));
    }
}
