// =============================================================================
// ENUMERATE — Énumération exhaustive des correspondances candidates
// =============================================================================
//
// Étant donnés une séquence d'éléments source S, une séquence d'éléments
// cible T et un prédicat de compatibilité P(s, t, carte_partielle), on
// produit TOUTES les correspondances injectives partielles S → T dont
// chaque paire satisfait P, évalué sur la carte accumulée jusque-là.
//
// ALGORITHME (récursion sur la tête de S) :
//
//   partial([], T)      = [ {} ]
//   partial(s :: S', T) =
//     pour chaque carte m de partial(S', T) :
//       pour chaque t de T, hors de l'image de m, avec P(s, t, m) :
//         produire m ∪ { s → t }
//       produire m                      (s laissé non mappé)
//
//   enumerate(S, T) = les cartes MAXIMALES de partial(S, T) : aucune source
//   absente n'y a encore de cible libre compatible.
//
// Un élément sans cible compatible est donc absent de la carte plutôt que
// de faire échouer l'énumération : les correspondances partielles sont des
// résultats valides.
//
// L'ordre de sortie est déterministe : ordre des cartes de la queue, puis
// ordre des cibles. Le sélecteur en dépend pour départager les ex-aequo.
//
// COMPLEXITÉ : exponentielle en |S| dans le pire cas. Les métamodèles
// visés comptent quelques dizaines d'éléments.
//
// =============================================================================

use std::hash::Hash;

use super::correspondence::Correspondence;

/// Énumère les correspondances injectives partielles maximales de
/// `sources` vers `targets` compatibles avec `compatible`.
///
/// Fonction pure : les tranches ne sont pas modifiées, chaque carte
/// produite est une valeur neuve.
pub fn enumerate_maps<S, T, P>(sources: &[S], targets: &[T], compatible: &P) -> Vec<Correspondence<S, T>>
where
    S: Copy + Eq + Hash,
    T: Copy + Eq + Hash,
    P: Fn(S, T, &Correspondence<S, T>) -> bool,
{
    partial_maps(sources, targets, compatible)
        .into_iter()
        .filter(|m| is_maximal(m, sources, targets, compatible))
        .collect()
}

/// Toutes les correspondances partielles, maximales ou non.
fn partial_maps<S, T, P>(sources: &[S], targets: &[T], compatible: &P) -> Vec<Correspondence<S, T>>
where
    S: Copy + Eq + Hash,
    T: Copy + Eq + Hash,
    P: Fn(S, T, &Correspondence<S, T>) -> bool,
{
    let Some((&head, tail)) = sources.split_first() else {
        return vec![Correspondence::new()];
    };

    let mut result = Vec::new();
    for partial in partial_maps(tail, targets, compatible) {
        for &target in targets {
            if !partial.contains_target(target) && compatible(head, target, &partial) {
                result.push(partial.with_pair(head, target));
            }
        }
        result.push(partial);
    }
    result
}

/// Aucune source absente de `map` ne peut encore y être ajoutée.
fn is_maximal<S, T, P>(map: &Correspondence<S, T>, sources: &[S], targets: &[T], compatible: &P) -> bool
where
    S: Copy + Eq + Hash,
    T: Copy + Eq + Hash,
    P: Fn(S, T, &Correspondence<S, T>) -> bool,
{
    sources
        .iter()
        .filter(|&&s| !map.contains_source(s))
        .all(|&s| {
            targets
                .iter()
                .all(|&t| map.contains_target(t) || !compatible(s, t, map))
        })
}

/// La plus grande carte, la première énumérée en cas d'égalité.
pub fn largest<S, T>(candidates: Vec<Correspondence<S, T>>) -> Correspondence<S, T>
where
    S: Copy + Eq + Hash,
    T: Copy + Eq + Hash,
{
    let mut best: Option<Correspondence<S, T>> = None;
    for candidate in candidates {
        let better = match &best {
            None => true,
            Some(current) => candidate.len() > current.len(),
        };
        if better {
            best = Some(candidate);
        }
    }
    best.unwrap_or_default()
}
