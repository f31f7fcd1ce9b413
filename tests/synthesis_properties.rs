//! Propriétés de l'énumération, de la sélection, de la synthèse et de
//! l'exécution, sur des catalogues générés.

use metasynth::config::{SynthesisConfig, TieBreak};
use metasynth::core::catalog::{Cardinality, Catalog, Side, KEY_ATTRIBUTE};
use metasynth::core::compat::{candidate_entity_maps, entity_compatible};
use metasynth::core::enumerate::enumerate_maps;
use metasynth::core::execute::execute;
use metasynth::core::expr::Phase;
use metasynth::core::instance::Instance;
use metasynth::core::refine::refine;
use metasynth::core::score::{score, select_best_plan};
use metasynth::core::synthesize::synthesize;
use metasynth::core::typeside::{Type, Value};
use metasynth::error::SynthesisError;
use metasynth::rules::parse_module;
use proptest::prelude::*;

// =============================================================================
// STRATÉGIES
// =============================================================================

/// Forme d'un catalogue : (abstraite ?, codes de types des attributs) par
/// entité, puis (propriétaire, cible, card1 multiple ?, card2 multiple ?)
/// par association.
#[derive(Debug, Clone)]
struct Shape {
    entities: Vec<(bool, Vec<u8>)>,
    associations: Vec<(usize, usize, bool, bool)>,
}

fn shape_strategy(max_entities: usize) -> impl Strategy<Value = Shape> {
    prop::collection::vec((prop::bool::weighted(0.25), prop::collection::vec(0u8..4, 0..3)), 0..=max_entities)
        .prop_flat_map(|entities| {
            let n = entities.len();
            let associations = if n == 0 {
                Just(Vec::new()).boxed()
            } else {
                prop::collection::vec((0..n, 0..n, any::<bool>(), any::<bool>()), 0..3).boxed()
            };
            (Just(entities), associations)
        })
        .prop_map(|(entities, associations)| Shape { entities, associations })
}

fn type_of(code: u8) -> Type {
    match code {
        0 => Type::Integer,
        1 => Type::Real,
        2 => Type::String,
        _ => Type::Boolean,
    }
}

fn card(many: bool) -> Cardinality {
    if many {
        Cardinality::Many
    } else {
        Cardinality::One
    }
}

fn build(shape: &Shape, name: &str, side: Side) -> Catalog {
    let mut c = Catalog::new(name, side);
    for (i, (is_abstract, attributes)) in shape.entities.iter().enumerate() {
        let entity = format!("E{}", i);
        if *is_abstract {
            c.add_abstract_entity(&entity);
        } else {
            c.add_entity(&entity);
        }
        for (j, code) in attributes.iter().enumerate() {
            c.add_attribute(&entity, &format!("a{}", j), type_of(*code));
        }
    }
    for (k, (owner, target, many1, many2)) in shape.associations.iter().enumerate() {
        c.add_association(
            &format!("E{}", owner),
            &format!("r{}", k),
            &format!("E{}", target),
            card(*many1),
            card(*many2),
        );
    }
    c
}

// =============================================================================
// ÉNUMÉRATION ET SÉLECTION
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Toute carte candidate est injective, non vide et compatible paire à paire.
    #[test]
    fn candidates_are_injective_and_compatible(
        src_shape in shape_strategy(4),
        tgt_shape in shape_strategy(4),
    ) {
        let src = build(&src_shape, "S", Side::Source);
        let tgt = build(&tgt_shape, "T", Side::Target);
        for map in candidate_entity_maps(&src, &tgt) {
            prop_assert!(map.is_injective());
            prop_assert!(!map.is_empty());
            for (s, t) in map.iter() {
                prop_assert!(entity_compatible(&src, &tgt, s, t));
            }
        }
    }

    /// Sans source, une seule carte : la carte vide.
    #[test]
    fn empty_source_gives_one_empty_map(targets in prop::collection::vec(0u32..100, 0..5)) {
        let maps = enumerate_maps(&[] as &[u32], &targets, &|_: u32, _: u32, _: &_| true);
        prop_assert_eq!(maps.len(), 1);
        prop_assert!(maps[0].is_empty());
    }

    /// Le plan retenu a le score maximal et, au départage par défaut, c'est
    /// le premier candidat qui l'atteint.
    #[test]
    fn selection_keeps_first_best(
        src_shape in shape_strategy(3),
        tgt_shape in shape_strategy(3),
    ) {
        let src = build(&src_shape, "S", Side::Source);
        let tgt = build(&tgt_shape, "T", Side::Target);
        let candidates = candidate_entity_maps(&src, &tgt);

        match select_best_plan(&src, &tgt, TieBreak::FirstEnumerated) {
            Err(SynthesisError::NoCandidateMap { .. }) => prop_assert!(candidates.is_empty()),
            Err(other) => prop_assert!(false, "erreur inattendue : {}", other),
            Ok(best) => {
                let scores: Vec<usize> = candidates.iter().map(|m| score(&src, &tgt, m)).collect();
                let max = scores.iter().copied().max().unwrap_or(0);
                prop_assert_eq!(best.score, max);
                let first = scores.iter().position(|&s| s == max).unwrap();
                prop_assert_eq!(&best.plan.entity_map, &candidates[first]);
                prop_assert_eq!(best.candidates, candidates.len());
            }
        }
    }

    /// Création avant raccordement, contraintes résolues, et le texte
    /// imprimé se relit à l'identique.
    #[test]
    fn synthesized_use_case_is_ordered_and_reparses(
        src_shape in shape_strategy(3),
        tgt_shape in shape_strategy(3),
    ) {
        let src = build(&src_shape, "S", Side::Source);
        let tgt = build(&tgt_shape, "T", Side::Target);
        let Ok(best) = select_best_plan(&src, &tgt, TieBreak::FirstEnumerated) else {
            return Ok(());
        };
        let use_case = synthesize(&src, &tgt, &best.plan).unwrap().into_use_case("Correspondence");

        let first_linking = use_case.constraints.iter().position(|c| c.phase == Phase::Linking);
        if let Some(first) = first_linking {
            prop_assert!(use_case.constraints[first..].iter().all(|c| c.phase == Phase::Linking));
        }
        prop_assert!(use_case.constraints.iter().all(|c| c.is_resolved()));

        let concrete = best.plan.entity_map.iter().filter(|&(e, _)| !src.entity(e).is_abstract).count();
        prop_assert_eq!(use_case.by_phase(Phase::Creation).count(), concrete);

        let text = use_case.to_string();
        let module = parse_module(&text).unwrap();
        prop_assert_eq!(module.rules.len(), use_case.len());
        for (parsed, original) in module.rules.iter().zip(&use_case.constraints) {
            prop_assert_eq!(parsed.to_string(), original.to_string());
        }
    }
}

// =============================================================================
// SCÉNARIOS
// =============================================================================

fn shop() -> Catalog {
    let mut c = Catalog::new("Shop", Side::Source);
    c.add_entity("Order")
     .add_entity("Customer")
     .add_attribute("Order", "total", Type::Real)
     .add_attribute("Customer", "name", Type::String)
     .add_association("Order", "customer", "Customer", Cardinality::Many, Cardinality::One);
    c
}

#[test]
fn refine_order_customer_scenario() {
    let outcome = refine(&shop(), None, &SynthesisConfig::default()).unwrap();
    let src = &outcome.source;
    let tgt = &outcome.target;

    let pairs: Vec<(String, String)> = outcome
        .plan
        .entity_map
        .iter()
        .map(|(s, t)| (src.entity(s).name.clone(), tgt.entity(t).name.clone()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("IN$Order".to_string(), "OUT$Order".to_string()),
            ("IN$Customer".to_string(), "OUT$Customer".to_string()),
        ]
    );

    for (s, _) in outcome.plan.entity_map.iter() {
        let attrs = outcome.plan.attribute_map(s).unwrap();
        for (sa, ta) in attrs.iter() {
            assert_eq!(src.attribute(sa).name, tgt.attribute(ta).name);
        }
        // `$id` plus l'attribut métier
        assert_eq!(attrs.len(), 2);
    }

    assert_eq!(outcome.use_case.by_phase(Phase::Creation).count(), 2);
    let linking: Vec<String> = outcome.use_case.by_phase(Phase::Linking).map(|c| c.to_string()).collect();
    assert_eq!(
        linking,
        vec!["IN$Order :: let x : OUT$Order = OUT$Order[$id] ; true => x.customer = OUT$Customer[customer.$id] ;"]
    );
}

#[test]
fn abstract_only_source_has_no_candidate() {
    let mut src = Catalog::new("S", Side::Source);
    src.add_abstract_entity("Shape");
    let mut tgt = Catalog::new("T", Side::Target);
    tgt.add_entity("Circle").add_entity("Square");

    let err = select_best_plan(&src, &tgt, TieBreak::FirstEnumerated).unwrap_err();
    assert!(matches!(err, SynthesisError::NoCandidateMap { source_entities: 1, .. }));

    // Avec une entité concrète en plus, le plan existe mais ignore l'abstraite
    src.add_entity("Label");
    let best = select_best_plan(&src, &tgt, TieBreak::FirstEnumerated).unwrap();
    let shape = src.entity_id("Shape").unwrap();
    assert!(!best.plan.entity_map.contains_source(shape));
    assert_eq!(best.plan.entity_map.len(), 1);
}

#[test]
fn tie_break_policy_is_opt_in() {
    let mut src = Catalog::new("S", Side::Source);
    src.add_entity("A");
    let mut tgt = Catalog::new("T", Side::Target);
    tgt.add_entity("Small")
       .add_entity("Wide")
       .add_attribute("Wide", "extra", Type::String);

    let first = select_best_plan(&src, &tgt, TieBreak::FirstEnumerated).unwrap();
    let widest = select_best_plan(&src, &tgt, TieBreak::MostTargetAttributes).unwrap();
    let a = src.entity_id("A").unwrap();
    assert_eq!(first.score, widest.score);
    assert_eq!(first.plan.entity_map.get(a), tgt.entity_id("Small"));
    assert_eq!(widest.plan.entity_map.get(a), tgt.entity_id("Wide"));
}

// =============================================================================
// EXÉCUTION
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Un objet cible par objet source, mêmes valeurs, liens recâblés.
    #[test]
    fn execution_copies_the_graph(
        customers in 0usize..4,
        orders in prop::collection::vec((0i64..1000, prop::option::of(0usize..4)), 0..6),
    ) {
        let outcome = refine(&shop(), None, &SynthesisConfig::default()).unwrap();
        let src = &outcome.source;
        let tgt = &outcome.target;

        let mut data = Instance::new("Data", src);
        let people: Vec<_> = (0..customers)
            .map(|i| data.insert(src, "IN$Customer", &[("name", Value::String(format!("client {}", i)))]))
            .collect();
        for (total, who) in &orders {
            let order = data.insert(src, "IN$Order", &[("total", Value::Real(*total as f64))]);
            if let Some(person) = who.and_then(|i| people.get(i)) {
                data.link(order, "customer", *person);
            }
        }

        let run = execute(&outcome.use_case, src, tgt, &data).unwrap();
        prop_assert_eq!(run.target.total_objects(), data.total_objects());
        prop_assert!(run.report.violations.is_empty());

        let in_order = src.entity_id("IN$Order").unwrap();
        let out_order = tgt.entity_id("OUT$Order").unwrap();
        for obj in data.extent(src, in_order) {
            let key = data.key_of(obj).unwrap().clone();
            let copy = run.target.find_by_key(tgt, out_order, &key).unwrap();
            prop_assert_eq!(run.target.get_attr(copy, "total"), data.get_attr(obj, "total"));

            let source_links: Vec<Value> = data
                .get_links(obj, "customer")
                .iter()
                .map(|&c| data.key_of(c).unwrap().clone())
                .collect();
            let target_links: Vec<Value> = run
                .target
                .get_links(copy, "customer")
                .iter()
                .map(|&c| run.target.key_of(c).unwrap().clone())
                .collect();
            prop_assert_eq!(source_links, target_links);
            prop_assert!(run.target.get_links(copy, "customer").iter().all(|c| c.side == Side::Target));
        }

        prop_assert!(run.target.extent(tgt, out_order).iter().all(|&o| run.target.key_of(o).is_some()));
        prop_assert!(tgt.find_attribute(out_order, KEY_ATTRIBUTE).is_some());
    }
}
