// =============================================================================
// HEURISTIC — Carte par défaut, par convention de nommage
// =============================================================================
//
// Quand source et cible sont deux copies renommées d'un même métamodèle,
// l'énumération est inutile : les noms suffisent.
//
//   IN$Order     ──(retirer IN$, ajouter OUT$)──▶  OUT$Order
//     total      ──(même nom)──────────────────▶     total
//     customer   ──(même rôle)─────────────────▶     customer
//
// Passe linéaire, sans retour arrière. Une entité sans homologue est
// signalée puis ignorée.
//
// =============================================================================

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::catalog::{Catalog, EntityId};
use super::correspondence::{AssociationMap, AttributeMap, EntityMap};
use super::score::MappingPlan;
use crate::config::NamingConvention;

/// Construit le plan par appariement des noms.
///
/// Retourne aussi les diagnostics des entités laissées de côté.
pub fn heuristic_plan(source: &Catalog, target: &Catalog, naming: &NamingConvention) -> (MappingPlan, Vec<String>) {
    let mut diagnostics = Vec::new();
    let mut entity_map = EntityMap::new();

    for (e, entity) in source.entities() {
        let Some(base) = entity.name.strip_prefix(naming.input_prefix.as_str()) else {
            debug!(entity = %entity.name, "entité hors convention, ignorée");
            continue;
        };
        let wanted = format!("{}{}", naming.output_prefix, base);
        match target.entity_id(&wanted) {
            Some(t) => {
                if !entity_map.try_insert(e, t) {
                    let message = format!("'{}' déjà pris, '{}' ignorée", wanted, entity.name);
                    warn!("{}", message);
                    diagnostics.push(message);
                }
            }
            None => {
                let message = format!("pas d'entité '{}' pour '{}'", wanted, entity.name);
                warn!("{}", message);
                diagnostics.push(message);
            }
        }
    }

    let mut attribute_maps = BTreeMap::new();
    let mut association_maps = BTreeMap::new();
    for (e, t) in entity_map.iter() {
        attribute_maps.insert(e, attributes_by_name(source, target, e, t));
        association_maps.insert(e, roles_by_name(source, target, e, t));
    }

    let plan = MappingPlan { entity_map, attribute_maps, association_maps };
    (plan, diagnostics)
}

fn attributes_by_name(source: &Catalog, target: &Catalog, e: EntityId, t: EntityId) -> AttributeMap {
    source
        .all_attributes(e)
        .into_iter()
        .filter_map(|sa| {
            target
                .find_attribute(t, &source.attribute(sa).name)
                .map(|ta| (sa, ta))
        })
        .collect()
}

fn roles_by_name(source: &Catalog, target: &Catalog, e: EntityId, t: EntityId) -> AssociationMap {
    source
        .all_associations(e)
        .into_iter()
        .filter_map(|sa| {
            target
                .find_role(t, &source.association(sa).role2)
                .map(|ta| (sa, ta))
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{Cardinality, Side};
    use crate::core::typeside::Type;

    fn shop() -> Catalog {
        let mut c = Catalog::new("Shop", Side::Source);
        c.add_entity("Order")
         .add_entity("Customer")
         .add_attribute("Order", "id", Type::String)
         .add_attribute("Order", "total", Type::Real)
         .add_attribute("Customer", "id", Type::String)
         .add_attribute("Customer", "name", Type::String)
         .add_association("Order", "customer", "Customer", Cardinality::Many, Cardinality::One);
        c
    }

    #[test]
    fn test_prefixed_copies_pair_one_to_one() {
        let base = shop();
        let src = base.renamed_copy("IN", Side::Source, "IN$");
        let tgt = base.renamed_copy("OUT", Side::Target, "OUT$");
        let (plan, diagnostics) = heuristic_plan(&src, &tgt, &NamingConvention::default());

        assert!(diagnostics.is_empty());
        assert_eq!(plan.entity_map.len(), 2);
        let order = src.entity_id("IN$Order").unwrap();
        assert_eq!(plan.entity_map.get(order), tgt.entity_id("OUT$Order"));

        let names: Vec<(String, String)> = plan
            .attribute_map(order)
            .unwrap()
            .iter()
            .map(|(s, t)| (src.attribute(s).name.clone(), tgt.attribute(t).name.clone()))
            .collect();
        assert_eq!(
            names,
            vec![("id".to_string(), "id".to_string()), ("total".to_string(), "total".to_string())]
        );
        assert_eq!(plan.association_map(order).unwrap().len(), 1);
        assert_eq!(plan.score(), 5);
    }

    #[test]
    fn test_missing_target_is_reported_and_skipped() {
        let base = shop();
        let src = base.renamed_copy("IN", Side::Source, "IN$");
        let mut tgt = Catalog::new("OUT", Side::Target);
        tgt.add_entity("OUT$Order").add_attribute("OUT$Order", "total", Type::Real);

        let (plan, diagnostics) = heuristic_plan(&src, &tgt, &NamingConvention::default());
        assert_eq!(plan.entity_map.len(), 1);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].contains("OUT$Customer"));

        // Le rôle `customer` n'a pas d'homologue : carte vide
        let order = src.entity_id("IN$Order").unwrap();
        assert!(plan.association_map(order).unwrap().is_empty());
        assert_eq!(plan.attribute_map(order).unwrap().len(), 1);
    }

    #[test]
    fn test_unprefixed_entities_are_ignored() {
        let src = shop();
        let tgt = shop().renamed_copy("OUT", Side::Target, "OUT$");
        let (plan, diagnostics) = heuristic_plan(&src, &tgt, &NamingConvention::default());
        assert!(plan.entity_map.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_custom_prefixes() {
        let base = shop();
        let src = base.renamed_copy("A", Side::Source, "a_");
        let tgt = base.renamed_copy("B", Side::Target, "b_");
        let (plan, _) = heuristic_plan(&src, &tgt, &NamingConvention::new("a_", "b_"));
        assert_eq!(plan.entity_map.len(), 2);
    }
}
