// =============================================================================
// SYNTHESIZE — Du plan aux contraintes de copie en deux phases
// =============================================================================
//
// Étant donné un plan (carte d'entités + sous-cartes par paire), on produit
// un ensemble de contraintes qui, exécuté sur une instance du métamodèle
// source, construit l'instance équivalente du métamodèle cible.
//
// ┌─────────────────────────────────────────────────────────────────────┐
// │ PHASE 1 : Créer les objets et copier les attributs                  │
// │                                                                     │
// │   e :: true => exists{x : t | x.$id = $id & x.ta1 = sa1 & ...} ;    │
// │                                                                     │
// │   Pour chaque objet de e, un objet de t porte la même clé et les    │
// │   valeurs des attributs appariés.                                   │
// ├─────────────────────────────────────────────────────────────────────┤
// │ PHASE 2 : Raccorder les associations                                │
// │                                                                     │
// │   e :: let x : t = t[$id] ; true => x.tr1 = T1[sr1.$id] & ... ;     │
// │                                                                     │
// │   L'objet cible est retrouvé par sa clé ; chaque rôle apparié pointe │
// │   vers l'image (par clé) de l'objet au bout du rôle source.         │
// └─────────────────────────────────────────────────────────────────────┘
//
// La phase 2 ne peut s'exécuter qu'une fois TOUS les objets créés : le
// résultat garde les deux suites séparées, la création d'abord.
//
// Les entités sources abstraites n'ont pas d'instances directes : leurs
// paires ne produisent rien, leurs caractéristiques sont copiées via les
// sous-classes concrètes (dont les cartes incluent l'hérité).
//
// =============================================================================

use std::collections::HashSet;

use tracing::{debug, info};

use super::catalog::{Catalog, EntityId, EntityRef, KEY_ATTRIBUTE};
use super::expr::{key_equality, Constraint, Expr, LetBinding, Phase, Quantifier, UseCase};
use super::score::MappingPlan;
use super::typeside::Type;
use crate::error::SynthesisError;

/// Contraintes produites, par phase.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Synthesis {
    pub creation: Vec<Constraint>,
    pub linking: Vec<Constraint>,
}

impl Synthesis {
    pub fn len(&self) -> usize {
        self.creation.len() + self.linking.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creation.is_empty() && self.linking.is_empty()
    }

    /// Concatène les deux phases, la création d'abord.
    pub fn into_use_case(self, name: &str) -> UseCase {
        let mut use_case = UseCase::new(name);
        use_case.constraints.extend(self.creation);
        use_case.constraints.extend(self.linking);
        use_case
    }
}

/// Synthétise les contraintes de copie d'un plan.
pub fn synthesize(source: &Catalog, target: &Catalog, plan: &MappingPlan) -> Result<Synthesis, SynthesisError> {
    check_plan(plan)?;

    // Paires concrètes, dans l'ordre de la carte
    let pairs: Vec<(EntityId, EntityId)> = plan
        .entity_map
        .iter()
        .filter(|&(e, _)| !source.entity(e).is_abstract)
        .collect();

    // Phase 1 : sous-classes d'abord (profondeur décroissante, tri stable)
    let mut creation_order = pairs.clone();
    creation_order.sort_by_key(|&(e, _)| std::cmp::Reverse(source.depth(e)));

    let mut synthesis = Synthesis::default();
    for &(e, t) in &creation_order {
        let constraint = creation_constraint(source, target, plan, e, t);
        debug!(constraint = %constraint, "contrainte de création");
        synthesis.creation.push(constraint);
    }

    // Phase 2 : seulement les paires qui ont des associations appariées
    for &(e, t) in &pairs {
        if plan.association_map(e).map_or(true, |m| m.is_empty()) {
            continue;
        }
        let constraint = linking_constraint(source, target, plan, e, t)?;
        debug!(constraint = %constraint, "contrainte de raccordement");
        synthesis.linking.push(constraint);
    }

    for constraint in synthesis.creation.iter().chain(synthesis.linking.iter()) {
        if !constraint.is_resolved() {
            return Err(SynthesisError::InvariantViolation(format!(
                "nœud non résolu dans la contrainte de {}",
                constraint.owner
            )));
        }
    }

    info!(
        creation = synthesis.creation.len(),
        linking = synthesis.linking.len(),
        "contraintes synthétisées"
    );
    Ok(synthesis)
}

/// Rejette un plan dont une carte n'est pas injective ou dont une
/// sous-carte ne correspond à aucune paire.
fn check_plan(plan: &MappingPlan) -> Result<(), SynthesisError> {
    if !plan.entity_map.is_injective() {
        return Err(SynthesisError::InvariantViolation("carte d'entités non injective".to_string()));
    }
    for (e, map) in &plan.attribute_maps {
        if !plan.entity_map.contains_source(*e) || !map.is_injective() {
            return Err(SynthesisError::InvariantViolation(format!(
                "carte d'attributs invalide pour l'entité #{}",
                e.0
            )));
        }
    }
    for (e, map) in &plan.association_maps {
        if !plan.entity_map.contains_source(*e) || !map.is_injective() {
            return Err(SynthesisError::InvariantViolation(format!(
                "carte d'associations invalide pour l'entité #{}",
                e.0
            )));
        }
    }
    Ok(())
}

/// Nom de variable libre sur `e` : ni attribut ni rôle de l'entité.
fn fresh_var(source: &Catalog, e: EntityId) -> String {
    let taken: HashSet<&str> = source
        .all_attributes(e)
        .into_iter()
        .map(|a| source.attribute(a).name.as_str())
        .chain(
            source
                .all_associations(e)
                .into_iter()
                .map(|a| source.association(a).role2.as_str()),
        )
        .collect();
    let mut name = "x".to_string();
    let mut n = 1;
    while taken.contains(name.as_str()) {
        name = format!("x{}", n);
        n += 1;
    }
    name
}

/// `x`, typé par l'entité cible
fn target_var(name: &str, t_ref: &EntityRef) -> Expr {
    Expr::var(name)
        .typed(Type::Entity(t_ref.clone()))
        .within(t_ref.clone())
}

/// e :: true => exists{x : t | x.$id = $id & x.ta = sa ...}
fn creation_constraint(source: &Catalog, target: &Catalog, plan: &MappingPlan, e: EntityId, t: EntityId) -> Constraint {
    let e_ref = source.entity_ref(e);
    let t_ref = target.entity_ref(t);
    let var = fresh_var(source, e);

    let mut parts = Vec::new();
    let mut attribute_pairs: Vec<_> = plan.attribute_map(e).map(|m| m.iter().collect()).unwrap_or_default();
    // l'égalité de clé vient toujours en tête
    attribute_pairs.sort_by_key(|&(sa, _)| source.attribute(sa).name != KEY_ATTRIBUTE);

    let key_paired = attribute_pairs.iter().any(|&(sa, ta)| {
        source.attribute(sa).name == KEY_ATTRIBUTE && target.attribute(ta).name == KEY_ATTRIBUTE
    });
    if !key_paired {
        parts.push(key_equality(&var, &t_ref, &e_ref));
    }

    for (sa, ta) in attribute_pairs {
        let s_attr = source.attribute(sa);
        let t_attr = target.attribute(ta);
        let lhs = Expr::attribute(Some(target_var(&var, &t_ref)), &t_attr.name)
            .typed(t_attr.ty.clone())
            .within(t_ref.clone());
        let rhs = Expr::attribute(None, &s_attr.name)
            .typed(s_attr.ty.clone())
            .within(e_ref.clone());
        parts.push(Expr::eq(lhs, rhs).typed(Type::Boolean).within(e_ref.clone()));
    }

    let body = Expr::conjunction(parts, &e_ref);
    let succedent = Expr::set_builder(Quantifier::Exists, &var, &t_ref.name, body)
        .typed(Type::Boolean)
        .within(e_ref.clone());
    let antecedent = Expr::boolean(true).within(e_ref.clone());
    Constraint::new(&e_ref, Vec::new(), antecedent, succedent, Phase::Creation)
}

/// e :: let x : t = t[$id] ; true => x.tr = T2[sr.$id] & ...
fn linking_constraint(
    source: &Catalog,
    target: &Catalog,
    plan: &MappingPlan,
    e: EntityId,
    t: EntityId,
) -> Result<Constraint, SynthesisError> {
    let e_ref = source.entity_ref(e);
    let t_ref = target.entity_ref(t);
    let var = fresh_var(source, e);

    let own_key = Expr::attribute(None, KEY_ATTRIBUTE)
        .typed(Type::String)
        .within(e_ref.clone());
    let lookup = Expr::class_ref(&t_ref.name, Some(own_key))
        .typed(Type::Entity(t_ref.clone()))
        .within(e_ref.clone());
    let binding = LetBinding {
        name: var.clone(),
        type_name: t_ref.name.clone(),
        ty: Some(Type::Entity(t_ref.clone())),
        expr: lookup,
    };

    let mut parts = Vec::new();
    if let Some(map) = plan.association_map(e) {
        for (sa, ta) in map.iter() {
            let s_assoc = source.association(sa);
            let t_assoc = target.association(ta);
            let Some(far_image) = plan.entity_map.get(s_assoc.target) else {
                return Err(SynthesisError::InvariantViolation(format!(
                    "le rôle '{}' de {} vise une entité sans image",
                    s_assoc.role2, e_ref.name
                )));
            };
            let far_source = source.entity_ref(s_assoc.target);
            let far_target = target.entity_ref(far_image);
            let many = s_assoc.card2.is_many();

            let lhs = Expr::role(Some(target_var(&var, &t_ref)), &t_assoc.role2)
                .typed(target.role_type(ta))
                .within(t_ref.clone());

            let navigated = Expr::role(None, &s_assoc.role2)
                .typed(source.role_type(sa))
                .within(e_ref.clone());
            let far_key = Expr::attribute(Some(navigated), KEY_ATTRIBUTE)
                .typed(collection_of(Type::String, many))
                .within(far_source);
            let rhs = Expr::class_ref(&far_target.name, Some(far_key))
                .typed(collection_of(Type::Entity(far_target.clone()), many))
                .within(e_ref.clone());

            parts.push(Expr::eq(lhs, rhs).typed(Type::Boolean).within(e_ref.clone()));
        }
    }

    let succedent = Expr::conjunction(parts, &e_ref);
    let antecedent = Expr::boolean(true).within(e_ref.clone());
    Ok(Constraint::new(&e_ref, vec![binding], antecedent, succedent, Phase::Linking))
}

fn collection_of(ty: Type, many: bool) -> Type {
    if many {
        Type::Set(Box::new(ty))
    } else {
        ty
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TieBreak;
    use crate::core::catalog::{Cardinality, Side};
    use crate::core::correspondence::{AttributeMap, EntityMap};
    use crate::core::score::select_best_plan;
    use pretty_assertions::assert_eq;

    fn shop(name: &str, side: Side) -> Catalog {
        let mut c = Catalog::new(name, side);
        c.add_entity("Order")
         .add_entity("Customer")
         .add_attribute("Order", "total", Type::Real)
         .add_attribute("Customer", "name", Type::String)
         .add_association("Order", "customer", "Customer", Cardinality::Many, Cardinality::One);
        c
    }

    fn synthesized() -> Synthesis {
        let src = shop("S", Side::Source);
        let tgt = shop("T", Side::Target);
        let best = select_best_plan(&src, &tgt, TieBreak::FirstEnumerated).unwrap();
        synthesize(&src, &tgt, &best.plan).unwrap()
    }

    #[test]
    fn test_one_creation_per_pair_and_linking_only_with_roles() {
        let s = synthesized();
        assert_eq!(s.creation.len(), 2);
        assert_eq!(s.linking.len(), 1);
        assert_eq!(s.linking[0].owner, "Order");
    }

    #[test]
    fn test_creation_text() {
        let s = synthesized();
        let texts: Vec<String> = s.creation.iter().map(|c| c.to_string()).collect();
        assert_eq!(
            texts,
            vec![
                "Order :: true => exists{x : Order | x.$id = $id & x.total = total} ;".to_string(),
                "Customer :: true => exists{x : Customer | x.$id = $id & x.name = name} ;".to_string(),
            ]
        );
    }

    #[test]
    fn test_linking_text() {
        let s = synthesized();
        assert_eq!(
            s.linking[0].to_string(),
            "Order :: let x : Order = Order[$id] ; true => x.customer = Customer[customer.$id] ;"
        );
    }

    #[test]
    fn test_use_case_puts_creation_first() {
        let uc = synthesized().into_use_case("Copy");
        assert_eq!(uc.len(), 3);
        let phases: Vec<Phase> = uc.constraints.iter().map(|c| c.phase).collect();
        assert_eq!(phases, vec![Phase::Creation, Phase::Creation, Phase::Linking]);
        assert!(uc.constraints.iter().all(|c| c.is_resolved()));
    }

    #[test]
    fn test_explicit_key_is_not_duplicated() {
        let mut src = Catalog::new("S", Side::Source);
        src.add_entity("A").add_attribute("A", KEY_ATTRIBUTE, Type::String);
        let mut tgt = Catalog::new("T", Side::Target);
        tgt.add_entity("B").add_attribute("B", KEY_ATTRIBUTE, Type::String);
        let best = select_best_plan(&src, &tgt, TieBreak::FirstEnumerated).unwrap();
        let s = synthesize(&src, &tgt, &best.plan).unwrap();
        assert_eq!(s.creation[0].to_string(), "A :: true => exists{x : B | x.$id = $id} ;");
    }

    #[test]
    fn test_empty_attribute_map_keeps_key_equality() {
        let mut src = Catalog::new("S", Side::Source);
        src.add_entity("A");
        let mut tgt = Catalog::new("T", Side::Target);
        tgt.add_entity("B");
        let mu: EntityMap = [(EntityId(0), EntityId(0))].into_iter().collect();
        let plan = MappingPlan::from_entity_map(&src, &tgt, mu);
        let s = synthesize(&src, &tgt, &plan).unwrap();
        assert_eq!(s.creation.len(), 1);
        assert!(s.linking.is_empty());
        assert_eq!(s.creation[0].to_string(), "A :: true => exists{x : B | x.$id = $id} ;");
    }

    #[test]
    fn test_abstract_pairs_are_skipped_and_subclasses_come_first() {
        let mut src = Catalog::new("S", Side::Source);
        src.add_abstract_entity("Shape")
           .add_entity("Figure")
           .add_entity("Circle")
           .add_superclass("Circle", "Figure");
        let mut tgt = Catalog::new("T", Side::Target);
        tgt.add_abstract_entity("Form").add_entity("Fig").add_entity("Disc");
        let mu: EntityMap = [
            (EntityId(0), EntityId(0)),
            (EntityId(1), EntityId(1)),
            (EntityId(2), EntityId(2)),
        ]
        .into_iter()
        .collect();
        let plan = MappingPlan::from_entity_map(&src, &tgt, mu);
        let s = synthesize(&src, &tgt, &plan).unwrap();
        let owners: Vec<&str> = s.creation.iter().map(|c| c.owner.as_str()).collect();
        assert_eq!(owners, vec!["Circle", "Figure"]);
    }

    #[test]
    fn test_variable_avoids_feature_names() {
        let mut src = Catalog::new("S", Side::Source);
        src.add_entity("P").add_attribute("P", "x", Type::Integer);
        let mut tgt = Catalog::new("T", Side::Target);
        tgt.add_entity("Q").add_attribute("Q", "x", Type::Integer);
        let best = select_best_plan(&src, &tgt, TieBreak::FirstEnumerated).unwrap();
        let s = synthesize(&src, &tgt, &best.plan).unwrap();
        assert_eq!(s.creation[0].to_string(), "P :: true => exists{x1 : Q | x1.$id = $id & x1.x = x} ;");
    }

    #[test]
    fn test_stray_sub_map_is_rejected() {
        let src = shop("S", Side::Source);
        let tgt = shop("T", Side::Target);
        let mut plan = MappingPlan::default();
        plan.attribute_maps.insert(EntityId(0), AttributeMap::new());
        let err = synthesize(&src, &tgt, &plan).unwrap_err();
        assert!(matches!(err, SynthesisError::InvariantViolation(_)));
    }
}
