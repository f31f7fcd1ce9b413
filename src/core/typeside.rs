// =============================================================================
// TYPESIDE — Les types et les valeurs manipulés par les métamodèles
// =============================================================================
//
// Un Type décrit ce que contient un attribut ou ce que produit une
// expression : un type de base (String, Integer...), une énumération, une
// entité, ou un conteneur (Set, Sequence) paramétré par son type d'élément.
//
// La relation de SOUS-TYPAGE est le seul outil dont a besoin le prédicat de
// compatibilité des attributs : copier une valeur étroite dans un champ plus
// large est toujours sûr.
//
//   Integer <: Long <: Real
//   Set(a) <: Set(b)            si a <: b
//   Sequence(a) <: Sequence(b)  si a <: b
//
// Les entités ne sont sous-types que d'elles-mêmes ici : l'héritage est
// connu du catalogue, et c'est le typecheck qui l'exploite.
//
// =============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

use super::catalog::EntityRef;

/// Un type du système.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Boolean,
    Integer,
    Long,
    Real,
    String,
    /// Énumération déclarée ailleurs, identifiée par son nom
    Enumeration(std::string::String),
    /// Référence vers une entité d'un des deux catalogues
    Entity(EntityRef),
    Set(Box<Type>),
    Sequence(Box<Type>),
}

impl Type {
    /// Nom du type, sans le paramètre des conteneurs.
    pub fn name(&self) -> &str {
        match self {
            Type::Boolean => "Boolean",
            Type::Integer => "Integer",
            Type::Long => "Long",
            Type::Real => "Real",
            Type::String => "String",
            Type::Enumeration(name) => name,
            Type::Entity(entity) => &entity.name,
            Type::Set(_) => "Set",
            Type::Sequence(_) => "Sequence",
        }
    }

    /// Type des éléments pour un conteneur, `None` sinon.
    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::Set(elem) | Type::Sequence(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        self.element_type().is_some()
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Integer | Type::Long | Type::Real)
    }

    /// L'entité désignée par ce type, directement ou via un conteneur.
    pub fn entity(&self) -> Option<&EntityRef> {
        match self {
            Type::Entity(entity) => Some(entity),
            Type::Set(elem) | Type::Sequence(elem) => elem.entity(),
            _ => None,
        }
    }

    /// Relation de sous-typage sans catalogue.
    ///
    /// Réflexive et transitive sur la chaîne numérique, covariante sur
    /// les conteneurs de même sorte.
    pub fn is_subtype_of(&self, other: &Type) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (Type::Integer, Type::Long) | (Type::Integer, Type::Real) | (Type::Long, Type::Real) => true,
            (Type::Set(a), Type::Set(b)) => a.is_subtype_of(b),
            (Type::Sequence(a), Type::Sequence(b)) => a.is_subtype_of(b),
            _ => false,
        }
    }

    /// Type de base désigné par un nom simple (`Integer`, `String`...).
    pub fn primitive(name: &str) -> Option<Type> {
        match name {
            "Boolean" => Some(Type::Boolean),
            "Integer" | "int" => Some(Type::Integer),
            "Long" | "long" => Some(Type::Long),
            "Real" | "double" => Some(Type::Real),
            "String" => Some(Type::String),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Set(elem) => write!(f, "Set({})", elem),
            Type::Sequence(elem) => write!(f, "Sequence({})", elem),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Une valeur littérale.
///
/// Ce sont les constantes des expressions et les cellules des instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    String(std::string::String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Null,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => {
                if r.fract() == 0.0 && r.is_finite() {
                    write!(f, "{:.1}", r)
                } else {
                    write!(f, "{}", r)
                }
            }
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
        }
    }
}

impl Value {
    /// Le type porté par cette valeur
    pub fn get_type(&self) -> Type {
        match self {
            Value::String(_) => Type::String,
            Value::Integer(_) => Type::Integer,
            Value::Real(_) => Type::Real,
            Value::Boolean(_) => Type::Boolean,
            Value::Null => Type::String, // null est polymorphe, par défaut String
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_chain() {
        assert!(Type::Integer.is_subtype_of(&Type::Long));
        assert!(Type::Integer.is_subtype_of(&Type::Real));
        assert!(Type::Long.is_subtype_of(&Type::Real));
        assert!(!Type::Real.is_subtype_of(&Type::Integer));
        assert!(!Type::String.is_subtype_of(&Type::Integer));
    }

    #[test]
    fn test_collections_are_covariant() {
        let ints = Type::Set(Box::new(Type::Integer));
        let reals = Type::Set(Box::new(Type::Real));
        assert!(ints.is_subtype_of(&reals));
        assert!(!reals.is_subtype_of(&ints));

        let seq = Type::Sequence(Box::new(Type::Integer));
        assert!(!seq.is_subtype_of(&ints));
    }

    #[test]
    fn test_name_and_element() {
        let t = Type::Sequence(Box::new(Type::String));
        assert_eq!(t.name(), "Sequence");
        assert_eq!(t.element_type(), Some(&Type::String));
        assert_eq!(format!("{}", t), "Sequence(String)");
        assert_eq!(Type::Real.element_type(), None);
    }

    #[test]
    fn test_value_types() {
        assert_eq!(Value::String("a".into()).get_type(), Type::String);
        assert_eq!(Value::Integer(3).get_type(), Type::Integer);
        assert_eq!(format!("{}", Value::Real(2.0)), "2.0");
    }
}
