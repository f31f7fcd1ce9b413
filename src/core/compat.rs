// =============================================================================
// COMPAT — Prédicats de compatibilité et cartes candidates par granularité
// =============================================================================
//
// Le moteur d'énumération est générique ; ce module l'instancie trois fois :
//
//   ENTITÉS      : t convient à s, sauf si s est abstraite et t concrète
//                  (une source abstraite ne va que vers une cible abstraite)
//
//   ATTRIBUTS    : t convient à s ssi type(s) <: type(t)
//                  (copier une valeur étroite dans un champ large est sûr)
//
//   ASSOCIATIONS : t convient à s ssi la carte des entités envoie la cible
//                  de s sur la cible de t, ET les cardinalités sont
//                  identiques aux deux extrémités
//
// Le prédicat des associations dépend d'une carte d'entités déjà fixée :
// on n'énumère les associations qu'une fois les entités choisies.
//
// =============================================================================

use super::catalog::{AssociationId, AttributeId, Catalog, EntityId};
use super::correspondence::{AssociationMap, AttributeMap, EntityMap};
use super::enumerate::enumerate_maps;

/// Règle d'abstraction entre deux entités.
pub fn entity_compatible(source: &Catalog, target: &Catalog, s: EntityId, t: EntityId) -> bool {
    !(source.entity(s).is_abstract && !target.entity(t).is_abstract)
}

/// Règle de sous-typage entre deux attributs.
pub fn attribute_compatible(source: &Catalog, target: &Catalog, s: AttributeId, t: AttributeId) -> bool {
    source.attribute(s).ty.is_subtype_of(&target.attribute(t).ty)
}

/// Règle d'extrémités et de cardinalités entre deux associations.
pub fn association_compatible(
    source: &Catalog,
    target: &Catalog,
    entity_map: &EntityMap,
    s: AssociationId,
    t: AssociationId,
) -> bool {
    let sa = source.association(s);
    let ta = target.association(t);
    entity_map.get(sa.target) == Some(ta.target) && sa.card1 == ta.card1 && sa.card2 == ta.card2
}

/// Cartes d'entités candidates : les cartes maximales NON VIDES.
///
/// Une liste vide signifie qu'aucune entité source n'a de cible.
pub fn candidate_entity_maps(source: &Catalog, target: &Catalog) -> Vec<EntityMap> {
    let sources = source.entity_ids();
    let targets = target.entity_ids();
    let pred = |s: EntityId, t: EntityId, _: &EntityMap| entity_compatible(source, target, s, t);
    enumerate_maps(&sources, &targets, &pred)
        .into_iter()
        .filter(|m| !m.is_empty())
        .collect()
}

/// Cartes d'attributs candidates pour la paire `(e, t)`, sur tous les
/// attributs disponibles (hérités compris).
pub fn candidate_attribute_maps(source: &Catalog, target: &Catalog, e: EntityId, t: EntityId) -> Vec<AttributeMap> {
    let sources = source.all_attributes(e);
    let targets = target.all_attributes(t);
    let pred = |s: AttributeId, t: AttributeId, _: &AttributeMap| attribute_compatible(source, target, s, t);
    enumerate_maps(&sources, &targets, &pred)
}

/// Cartes d'associations candidates pour la paire `(e, t)` sous la carte
/// d'entités `entity_map`.
pub fn candidate_association_maps(
    source: &Catalog,
    target: &Catalog,
    entity_map: &EntityMap,
    e: EntityId,
    t: EntityId,
) -> Vec<AssociationMap> {
    let sources = source.all_associations(e);
    let targets = target.all_associations(t);
    let pred = |s: AssociationId, t: AssociationId, _: &AssociationMap| {
        association_compatible(source, target, entity_map, s, t)
    };
    enumerate_maps(&sources, &targets, &pred)
}
