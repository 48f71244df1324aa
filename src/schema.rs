// This file is part of the terraform-provider-edge project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Shorthands to declare attributes

use std::collections::HashMap;

use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType, Description};

fn attribute(attr_type: AttributeType, constraint: AttributeConstraint, description: &str) -> Attribute {
    Attribute {
        attr_type,
        description: Description::plain(description),
        constraint,
        ..Default::default()
    }
}

pub(crate) fn required(attr_type: AttributeType, description: &str) -> Attribute {
    attribute(attr_type, AttributeConstraint::Required, description)
}

pub(crate) fn optional(attr_type: AttributeType, description: &str) -> Attribute {
    attribute(attr_type, AttributeConstraint::Optional, description)
}

/// Optional attribute that gets a default value when not set
pub(crate) fn optional_computed(attr_type: AttributeType, description: &str) -> Attribute {
    attribute(attr_type, AttributeConstraint::OptionalComputed, description)
}

pub(crate) fn computed(attr_type: AttributeType, description: &str) -> Attribute {
    attribute(attr_type, AttributeConstraint::Computed, description)
}

pub(crate) fn sensitive(attribute: Attribute) -> Attribute {
    Attribute {
        sensitive: true,
        ..attribute
    }
}

pub(crate) fn string_list() -> AttributeType {
    AttributeType::List(AttributeType::String.into())
}

pub(crate) fn string_set() -> AttributeType {
    AttributeType::Set(AttributeType::String.into())
}

pub(crate) fn number_list() -> AttributeType {
    AttributeType::List(AttributeType::Number.into())
}

/// Computed list of objects, as returned by listing data sources
pub(crate) fn computed_objects(
    description: &str,
    attributes: HashMap<String, Attribute>,
) -> Attribute {
    computed(AttributeType::AttributeList(attributes), description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tf_provider::map;

    #[test]
    fn shorthands_set_constraint() {
        assert_eq!(
            required(AttributeType::String, "x").constraint,
            AttributeConstraint::Required
        );
        assert_eq!(
            optional_computed(AttributeType::Bool, "x").constraint,
            AttributeConstraint::OptionalComputed
        );
        let secret = sensitive(optional(AttributeType::String, "x"));
        assert!(secret.sensitive);
        assert_eq!(secret.constraint, AttributeConstraint::Optional);
    }

    #[test]
    fn objects_are_nested_attributes() {
        let list = computed_objects(
            "items",
            tf_provider::map! {
                "name" => computed(AttributeType::String, "Name"),
            },
        );
        assert_eq!(list.constraint, AttributeConstraint::Computed);
        assert!(matches!(list.attr_type, AttributeType::AttributeList(ref attrs) if attrs.contains_key("name")));
    }
}
