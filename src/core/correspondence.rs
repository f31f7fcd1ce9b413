// =============================================================================
// CORRESPONDENCE — Une correspondance injective source → cible
// =============================================================================
//
// Une Correspondence associe des éléments source à des éléments cible, à
// UNE granularité : entités, attributs d'une paire d'entités, ou
// associations d'une paire d'entités.
//
// Deux règles, garanties à la CONSTRUCTION et jamais filtrées après coup :
//   - les clés sont uniques (un élément source a au plus une image)
//   - l'application est injective (deux sources n'ont jamais la même image)
//
// Elle est PARTIELLE : un élément source sans cible compatible est
// simplement absent.
//
// EXEMPLE :
//   entités   : { Order → OUT$Order, Customer → OUT$Customer }
//   attributs : { id → id, total → total }
//
// =============================================================================

use std::collections::HashSet;
use std::hash::Hash;

use indexmap::IndexMap;

use super::catalog::{AssociationId, AttributeId, EntityId};

/// Correspondance entre entités
pub type EntityMap = Correspondence<EntityId, EntityId>;
/// Correspondance entre attributs d'une paire d'entités
pub type AttributeMap = Correspondence<AttributeId, AttributeId>;
/// Correspondance entre associations d'une paire d'entités
pub type AssociationMap = Correspondence<AssociationId, AssociationId>;

/// Correspondance injective et partielle, dans l'ordre d'insertion.
#[derive(Debug, Clone)]
pub struct Correspondence<S, T>
where
    S: Copy + Eq + Hash,
    T: Copy + Eq + Hash,
{
    pairs: IndexMap<S, T>,
    range: HashSet<T>,
}

impl<S, T> Correspondence<S, T>
where
    S: Copy + Eq + Hash,
    T: Copy + Eq + Hash,
{
    /// Correspondance vide
    pub fn new() -> Self {
        Correspondence {
            pairs: IndexMap::new(),
            range: HashSet::new(),
        }
    }

    /// Nouvelle correspondance étendue EN TÊTE par `source → target`.
    ///
    /// L'énumération ajoute les sources de la dernière à la première : en
    /// insérant devant, les paires restent dans l'ordre des sources.
    /// L'appelant garantit que `source` n'est pas encore mappé et que
    /// `target` n'est pas encore dans l'image.
    pub fn with_pair(&self, source: S, target: T) -> Self {
        debug_assert!(!self.pairs.contains_key(&source));
        debug_assert!(!self.range.contains(&target));
        let mut extended = self.clone();
        extended.pairs.shift_insert(0, source, target);
        extended.range.insert(target);
        extended
    }

    /// Ajoute `source → target` si cela préserve clés uniques et injectivité.
    /// Retourne `false` sans rien modifier sinon.
    pub fn try_insert(&mut self, source: S, target: T) -> bool {
        if self.pairs.contains_key(&source) || self.range.contains(&target) {
            return false;
        }
        self.pairs.insert(source, target);
        self.range.insert(target);
        true
    }

    pub fn get(&self, source: S) -> Option<T> {
        self.pairs.get(&source).copied()
    }

    pub fn contains_source(&self, source: S) -> bool {
        self.pairs.contains_key(&source)
    }

    /// `target` est-il déjà l'image d'un élément source ?
    pub fn contains_target(&self, target: T) -> bool {
        self.range.contains(&target)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Les paires, dans l'ordre d'insertion
    pub fn iter(&self) -> impl Iterator<Item = (S, T)> + '_ {
        self.pairs.iter().map(|(&s, &t)| (s, t))
    }

    pub fn sources(&self) -> impl Iterator<Item = S> + '_ {
        self.pairs.keys().copied()
    }

    /// Vérifie l'injectivité à partir des seules paires.
    pub fn is_injective(&self) -> bool {
        let mut seen = HashSet::new();
        self.pairs.values().all(|t| seen.insert(*t))
    }
}

impl<S, T> Default for Correspondence<S, T>
where
    S: Copy + Eq + Hash,
    T: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Deux correspondances sont égales si elles ont les mêmes paires,
/// quel que soit l'ordre d'insertion.
impl<S, T> PartialEq for Correspondence<S, T>
where
    S: Copy + Eq + Hash,
    T: Copy + Eq + Hash,
{
    fn eq(&self, other: &Self) -> bool {
        self.pairs == other.pairs
    }
}

impl<S, T> Eq for Correspondence<S, T>
where
    S: Copy + Eq + Hash,
    T: Copy + Eq + Hash,
{
}

impl<S, T> FromIterator<(S, T)> for Correspondence<S, T>
where
    S: Copy + Eq + Hash,
    T: Copy + Eq + Hash,
{
    /// Les paires qui casseraient l'injectivité sont ignorées.
    fn from_iter<I: IntoIterator<Item = (S, T)>>(iter: I) -> Self {
        let mut map = Correspondence::new();
        for (s, t) in iter {
            map.try_insert(s, t);
        }
        map
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_pair_leaves_original_untouched() {
        let empty: Correspondence<u8, char> = Correspondence::new();
        let one = empty.with_pair(1, 'a');
        assert!(empty.is_empty());
        assert_eq!(one.get(1), Some('a'));
        assert!(one.contains_target('a'));

        let two = one.with_pair(0, 'z');
        let order: Vec<u8> = two.sources().collect();
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn test_try_insert_rejects_reuse() {
        let mut m: Correspondence<u8, char> = Correspondence::new();
        assert!(m.try_insert(1, 'a'));
        assert!(!m.try_insert(2, 'a'), "cible déjà utilisée");
        assert!(!m.try_insert(1, 'b'), "source déjà mappée");
        assert_eq!(m.len(), 1);
        assert!(m.is_injective());
    }

    #[test]
    fn test_equality_ignores_order() {
        let a: Correspondence<u8, char> = [(1, 'a'), (2, 'b')].into_iter().collect();
        let b: Correspondence<u8, char> = [(2, 'b'), (1, 'a')].into_iter().collect();
        assert_eq!(a, b);
    }
}
