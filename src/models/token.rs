//! Values that resolve at deploy time.
//!
//! Identifiers in a [`crate::models::Topology`] are logical ids. The physical
//! ids only exist once the provisioning engine has created the resources, so
//! anything that points at a resource is carried as a [`Token`].

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// A plain string.
    Literal(String),
    /// The primary id of the resource with this logical id.
    Ref(String),
    /// A named attribute of the resource with this logical id.
    GetAtt(String, String),
    /// A string with `${...}` placeholders resolved by the engine.
    Sub(String),
    /// The n-th availability zone of the region the stack is deployed in.
    SelectAz(usize),
}

impl Token {
    pub fn literal(value: impl Into<String>) -> Token {
        Token::Literal(value.into())
    }

    pub fn reference(logical_id: impl Into<String>) -> Token {
        Token::Ref(logical_id.into())
    }

    pub fn get_att(logical_id: impl Into<String>, attribute: impl Into<String>) -> Token {
        Token::GetAtt(logical_id.into(), attribute.into())
    }
}

impl Serialize for Token {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Token::Literal(value) => serializer.serialize_str(value),
            Token::Ref(id) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Ref", id)?;
                map.end()
            }
            Token::GetAtt(id, attribute) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::GetAtt", &[id, attribute])?;
                map.end()
            }
            Token::Sub(template) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::Sub", template)?;
                map.end()
            }
            Token::SelectAz(index) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::Select", &SelectAz(*index))?;
                map.end()
            }
        }
    }
}

struct SelectAz(usize);

impl Serialize for SelectAz {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut get_azs = std::collections::BTreeMap::new();
        get_azs.insert("Fn::GetAZs", "");
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(&self.0)?;
        seq.serialize_element(&get_azs)?;
        seq.end()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Literal(value) => write!(f, "{value}"),
            Token::Ref(id) => write!(f, "${{Ref:{id}}}"),
            Token::GetAtt(id, attribute) => write!(f, "${{{id}.{attribute}}}"),
            Token::Sub(template) => write!(f, "{template}"),
            Token::SelectAz(index) => write!(f, "${{AZ[{index}]}}"),
        }
    }
}
