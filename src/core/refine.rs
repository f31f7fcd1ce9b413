// =============================================================================
// REFINE — Mode raffinement : un métamodèle vers lui-même
// =============================================================================
//
// Le mode raffinement part d'UN métamodèle et produit les règles qui
// copient toute instance de ce métamodèle, plus les règles métier fournies
// par l'utilisateur.
//
//   métamodèle M
//     │ 1. validation, clé `$id` sur les racines
//     ├──────────────┐
//     ▼              ▼
//   IN$M (source)  OUT$M (cible)        2. deux copies renommées
//     │              │
//     └──── plan ────┘                  3. heuristique ou carte 1:1
//            │
//            ▼
//   synthèse (phase 1, phase 2)         4.
//            │
//            ▼
//   + règles du module externe          5. rien n'est fusionné si le
//            │                             module ne se lit pas
//            ▼
//   typage des contraintes              6. erreurs par contrainte
//
// =============================================================================

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use super::catalog::{Catalog, Side, KEY_ATTRIBUTE};
use super::correspondence::{AssociationMap, AttributeMap, EntityMap};
use super::expr::UseCase;
use super::heuristic::heuristic_plan;
use super::score::MappingPlan;
use super::synthesize::synthesize;
use super::typecheck::{typecheck_use_case, validate_catalog};
use super::typeside::Type;
use crate::config::{RefineStrategy, SynthesisConfig};
use crate::error::{RefineError, TypeCheckError};
use crate::rules::parse_module;

/// Tout ce que produit le mode raffinement.
#[derive(Debug, Clone)]
pub struct RefineOutcome {
    /// Copie d'entrée (`IN$...`)
    pub source: Catalog,
    /// Copie de sortie (`OUT$...`)
    pub target: Catalog,
    pub plan: MappingPlan,
    /// Phase 1, phase 2, puis les règles du module externe
    pub use_case: UseCase,
    /// Entités laissées de côté par l'heuristique
    pub diagnostics: Vec<String>,
    /// Contraintes qui ne se typent pas ; les autres restent utilisables
    pub type_errors: Vec<TypeCheckError>,
}

/// Enchaîne les six étapes sur `metamodel`.
///
/// `rules` est le texte d'un module (`module Nom ... end`) ajouté après
/// les contraintes synthétisées.
pub fn refine(metamodel: &Catalog, rules: Option<&str>, config: &SynthesisConfig) -> Result<RefineOutcome, RefineError> {
    if let Err(errors) = validate_catalog(metamodel) {
        for error in &errors {
            warn!(catalog = %metamodel.name, "{}", error);
        }
        if let Some(first) = errors.into_iter().next() {
            return Err(first.into());
        }
    }

    let mut keyed = metamodel.clone();
    ensure_keys(&mut keyed)?;

    let naming = &config.naming;
    let source = keyed.renamed_copy(
        &format!("{}{}", naming.input_prefix, keyed.name),
        Side::Source,
        &naming.input_prefix,
    );
    let target = keyed.renamed_copy(
        &format!("{}{}", naming.output_prefix, keyed.name),
        Side::Target,
        &naming.output_prefix,
    );

    let (plan, diagnostics) = match config.refine_strategy {
        RefineStrategy::Heuristic => heuristic_plan(&source, &target, naming),
        RefineStrategy::Duplicated => (duplicated_plan(&source), Vec::new()),
    };
    debug!(score = plan.score(), pairs = plan.entity_map.len(), "plan du raffinement");

    let mut use_case = synthesize(&source, &target, &plan)?.into_use_case(&use_case_name(&keyed.name));

    if let Some(text) = rules {
        let module = parse_module(text).map_err(|err| {
            warn!("{}", err);
            RefineError::MalformedModule(err)
        })?;
        info!(module = %module.name, rules = module.rules.len(), "module de règles ajouté");
        use_case.constraints.extend(module.rules);
    }

    let type_errors = if config.typecheck {
        typecheck_use_case(&mut use_case, &source, &target)
    } else {
        Vec::new()
    };
    for error in &type_errors {
        warn!("{}", error);
    }

    info!(
        metamodel = %metamodel.name,
        constraints = use_case.len(),
        diagnostics = diagnostics.len(),
        type_errors = type_errors.len(),
        "raffinement terminé"
    );
    Ok(RefineOutcome { source, target, plan, use_case, diagnostics, type_errors })
}

/// Déclare `$id : String` sur chaque racine qui n'est pas une interface.
fn ensure_keys(catalog: &mut Catalog) -> Result<(), RefineError> {
    let missing: Vec<String> = catalog
        .roots()
        .into_iter()
        .filter(|&e| !catalog.entity(e).is_interface && catalog.find_attribute(e, KEY_ATTRIBUTE).is_none())
        .map(|e| catalog.entity(e).name.clone())
        .collect();
    for name in missing {
        catalog.insert_attribute(&name, KEY_ATTRIBUTE, Type::String)?;
        debug!(entity = %name, "clé ajoutée");
    }
    Ok(())
}

/// Carte 1:1 d'une duplication : mêmes indices des deux côtés.
fn duplicated_plan(source: &Catalog) -> MappingPlan {
    let mut entity_map = EntityMap::new();
    let mut attribute_maps = BTreeMap::new();
    let mut association_maps = BTreeMap::new();
    for e in source.entity_ids() {
        entity_map.try_insert(e, e);
        let attributes: AttributeMap = source.all_attributes(e).into_iter().map(|a| (a, a)).collect();
        let associations: AssociationMap = source.all_associations(e).into_iter().map(|a| (a, a)).collect();
        attribute_maps.insert(e, attributes);
        association_maps.insert(e, associations);
    }
    MappingPlan { entity_map, attribute_maps, association_maps }
}

/// `Refine` suivi des caractères de nom valides du métamodèle
fn use_case_name(metamodel: &str) -> String {
    let clean: String = metamodel
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    format!("Refine{}", clean)
}
