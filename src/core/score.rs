// =============================================================================
// SCORE — Évaluation des cartes d'entités et choix de la meilleure
// =============================================================================
//
// Une carte d'entités μ ne dit rien des attributs ni des associations. Pour
// chaque paire (e, μ(e)), on énumère les cartes d'attributs et
// d'associations candidates et on garde la PLUS GRANDE (la première
// énumérée en cas d'égalité). Le score de μ est la somme de ces tailles :
//
//   score(μ) = Σ_(e, μ(e))  |meilleure carte d'attributs|
//                         + |meilleure carte d'associations|
//
// Le sélecteur parcourt les candidats dans l'ordre d'énumération et ne
// remplace le meilleur courant que sur un score STRICTEMENT supérieur :
// à égalité, le premier énuméré reste.
//
// Le résultat est un PLAN : la carte d'entités et, pour chaque paire, ses
// sous-cartes. C'est exactement ce que consomme le synthétiseur.
//
// =============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::catalog::{Catalog, EntityId};
use super::compat::{candidate_association_maps, candidate_attribute_maps, candidate_entity_maps};
use super::correspondence::{AssociationMap, AttributeMap, EntityMap};
use super::enumerate::largest;
use crate::config::TieBreak;
use crate::error::SynthesisError;

/// Carte d'entités et sous-cartes par paire, indexées par entité source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingPlan {
    pub entity_map: EntityMap,
    pub attribute_maps: BTreeMap<EntityId, AttributeMap>,
    pub association_maps: BTreeMap<EntityId, AssociationMap>,
}

impl MappingPlan {
    /// Construit le plan d'une carte d'entités en retenant, pour chaque
    /// paire, la plus grande carte d'attributs et d'associations.
    pub fn from_entity_map(source: &Catalog, target: &Catalog, entity_map: EntityMap) -> Self {
        let mut attribute_maps = BTreeMap::new();
        let mut association_maps = BTreeMap::new();
        for (e, t) in entity_map.iter() {
            let attrs = largest(candidate_attribute_maps(source, target, e, t));
            let assocs = largest(candidate_association_maps(source, target, &entity_map, e, t));
            attribute_maps.insert(e, attrs);
            association_maps.insert(e, assocs);
        }
        MappingPlan { entity_map, attribute_maps, association_maps }
    }

    pub fn attribute_map(&self, e: EntityId) -> Option<&AttributeMap> {
        self.attribute_maps.get(&e)
    }

    pub fn association_map(&self, e: EntityId) -> Option<&AssociationMap> {
        self.association_maps.get(&e)
    }

    /// Somme des tailles des sous-cartes
    pub fn score(&self) -> usize {
        let attrs: usize = self.attribute_maps.values().map(|m| m.len()).sum();
        let assocs: usize = self.association_maps.values().map(|m| m.len()).sum();
        attrs + assocs
    }

    /// Vue nommée et sérialisable du plan.
    pub fn report(&self, source: &Catalog, target: &Catalog) -> PlanReport {
        let pairs = self
            .entity_map
            .iter()
            .map(|(e, t)| {
                let attributes = self
                    .attribute_map(e)
                    .map(|m| {
                        m.iter()
                            .map(|(s, t)| (source.attribute(s).name.clone(), target.attribute(t).name.clone()))
                            .collect()
                    })
                    .unwrap_or_default();
                let associations = self
                    .association_map(e)
                    .map(|m| {
                        m.iter()
                            .map(|(s, t)| (source.association(s).role2.clone(), target.association(t).role2.clone()))
                            .collect()
                    })
                    .unwrap_or_default();
                PairReport {
                    source: source.entity(e).name.clone(),
                    target: target.entity(t).name.clone(),
                    attributes,
                    associations,
                }
            })
            .collect();
        PlanReport {
            source: source.name.clone(),
            target: target.name.clone(),
            score: self.score(),
            pairs,
        }
    }
}

/// Un plan retenu par le sélecteur.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredPlan {
    pub plan: MappingPlan,
    pub score: usize,
    /// Nombre de cartes d'entités examinées
    pub candidates: usize,
}

/// Score d'une carte d'entités.
pub fn score(source: &Catalog, target: &Catalog, entity_map: &EntityMap) -> usize {
    MappingPlan::from_entity_map(source, target, entity_map.clone()).score()
}

/// Nombre total d'attributs (hérités compris) des entités cibles atteintes.
fn target_attribute_weight(target: &Catalog, entity_map: &EntityMap) -> usize {
    entity_map.iter().map(|(_, t)| target.all_attributes(t).len()).sum()
}

/// Énumère les cartes d'entités, les évalue et retient la meilleure.
///
/// Échoue avec `NoCandidateMap` si aucune entité source ne trouve de cible.
pub fn select_best_plan(
    source: &Catalog,
    target: &Catalog,
    tie_break: TieBreak,
) -> Result<ScoredPlan, SynthesisError> {
    let candidates = candidate_entity_maps(source, target);
    if candidates.is_empty() {
        warn!(
            source = %source.name,
            target = %target.name,
            "aucune carte d'entités candidate"
        );
        return Err(SynthesisError::NoCandidateMap {
            source_catalog: source.name.clone(),
            target_catalog: target.name.clone(),
            source_entities: source.len(),
        });
    }

    let total = candidates.len();
    let mut best: Option<(MappingPlan, usize)> = None;
    for (index, entity_map) in candidates.into_iter().enumerate() {
        let plan = MappingPlan::from_entity_map(source, target, entity_map);
        let score = plan.score();
        debug!(index, score, pairs = plan.entity_map.len(), "carte candidate évaluée");

        let better = match &best {
            None => true,
            Some((current, current_score)) => {
                score > *current_score
                    || (score == *current_score
                        && tie_break == TieBreak::MostTargetAttributes
                        && target_attribute_weight(target, &plan.entity_map)
                            > target_attribute_weight(target, &current.entity_map))
            }
        };
        if better {
            best = Some((plan, score));
        }
    }

    let Some((plan, score)) = best else {
        return Err(SynthesisError::InvariantViolation("sélection sans candidat".to_string()));
    };
    info!(
        score,
        candidates = total,
        plan = %plan.report(source, target),
        "plan retenu"
    );
    Ok(ScoredPlan { plan, score, candidates: total })
}

// =============================================================================
// Rapport
// =============================================================================

/// Le plan avec des noms à la place des indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanReport {
    pub source: String,
    pub target: String,
    pub score: usize,
    pub pairs: Vec<PairReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairReport {
    pub source: String,
    pub target: String,
    pub attributes: Vec<(String, String)>,
    pub associations: Vec<(String, String)>,
}

impl fmt::Display for PlanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} (score {}) {{", self.source, self.target, self.score)?;
        for (i, pair) in self.pairs.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " {} -> {}", pair.source, pair.target)?;
            let features: Vec<String> = pair
                .attributes
                .iter()
                .chain(pair.associations.iter())
                .map(|(s, t)| format!("{}->{}", s, t))
                .collect();
            if !features.is_empty() {
                write!(f, " [{}]", features.join(" "))?;
            }
        }
        write!(f, " }}")
    }
}
