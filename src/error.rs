//! Erreurs de la synthèse de correspondances.
//!
//! Une énumération par préoccupation : construction des catalogues,
//! synthèse, lecture des modules de règles, typage et exécution.
//! L'orchestrateur du mode raffinement les regroupe dans `RefineError`.

use thiserror::Error;

/// Erreurs de construction d'un catalogue (entrées externes).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// Deux entités portent le même nom
    #[error("entité '{entity}' déjà déclarée dans le catalogue '{catalog}'")]
    DuplicateEntity {
        catalog: String,
        entity: String,
    },

    /// Référence vers une entité absente
    #[error("entité inconnue '{entity}' dans le catalogue '{catalog}'")]
    UnknownEntity {
        catalog: String,
        entity: String,
    },

    /// Attribut déclaré deux fois sur la même entité
    #[error("attribut '{attribute}' déjà déclaré sur '{entity}'")]
    DuplicateAttribute {
        entity: String,
        attribute: String,
    },

    /// Rôle d'association déclaré deux fois sur la même entité
    #[error("rôle '{role}' déjà déclaré sur '{entity}'")]
    DuplicateRole {
        entity: String,
        role: String,
    },

    /// Une entité ne peut pas hériter d'elle-même
    #[error("l'entité '{0}' ne peut pas être sa propre super-classe")]
    SelfInheritance(String),

    /// Cycle dans le graphe d'héritage
    #[error("cycle d'héritage passant par '{0}'")]
    InheritanceCycle(String),

    /// Deux caractéristiques disponibles sur une entité portent le même nom
    #[error("'{feature}' est défini plusieurs fois sur '{entity}' (héritage compris)")]
    FeatureClash {
        entity: String,
        feature: String,
    },
}

/// Erreurs de la sélection et de la synthèse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    /// L'énumération des entités ne produit aucun candidat
    #[error("aucune correspondance candidate entre '{source_catalog}' et '{target_catalog}' ({source_entities} entités source)")]
    NoCandidateMap {
        source_catalog: String,
        target_catalog: String,
        source_entities: usize,
    },

    /// Un invariant interne (injectivité, résolution des types) est violé :
    /// c'est un défaut de l'appelant, pas une condition récupérable.
    #[error("invariant violé : {0}")]
    InvariantViolation(String),
}

/// Erreur de lecture d'un module de règles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("module de règles invalide (ligne {line}, colonne {column}) : {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// Diagnostic de typage attaché à une contrainte du cas d'utilisation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("contrainte #{index} ({owner}) : {message}")]
pub struct TypeCheckError {
    /// Position de la contrainte dans le cas d'utilisation
    pub index: usize,
    /// Entité propriétaire de la contrainte
    pub owner: String,
    pub message: String,
}

/// Erreurs de l'interpréteur de règles.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("entité '{0}' absente de l'instance")]
    UnknownEntity(String),

    #[error("'{feature}' n'est ni un attribut ni un rôle de '{entity}'")]
    UnknownFeature {
        entity: String,
        feature: String,
    },

    #[error("aucun objet de '{entity}' ne porte la clé '{key}'")]
    MissingKey {
        entity: String,
        key: String,
    },

    #[error("variable non liée '{0}'")]
    UnboundVariable(String),

    #[error("expression non exécutable en succédent : {0}")]
    NotExecutable(String),

    #[error("type inattendu : {0}")]
    TypeMismatch(String),
}

/// Erreurs du mode raffinement.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RefineError {
    /// Le module de règles externe ne se lit pas : rien n'est fusionné
    #[error(transparent)]
    MalformedModule(#[from] ParseError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
