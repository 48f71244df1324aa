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

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeType, Block, Description, Schema};
use tf_provider::value::{ValueEmpty, ValueList, ValueString};
use tf_provider::{map, DataSource, Diagnostics};

use crate::connection::Connection;
use crate::error::Error;
use crate::schema::{computed, optional_computed, string_list};
use crate::service::ssl::CertificateInfo;
use crate::service::SslCertificateService;
use crate::utils::{no_errors, or_report, strings_list};

/// Lookup of a certificate by id or by name
#[derive(Debug, Clone, Default)]
pub struct SslCertificateDataSource {
    connection: Connection,
}

impl SslCertificateDataSource {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CertificateDataState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub certificate: ValueString<'a>,
    pub issuer: ValueString<'a>,
    pub domains: ValueList<ValueString<'a>>,
    pub not_before: ValueString<'a>,
    pub not_after: ValueString<'a>,
}

impl<'a> From<CertificateInfo> for CertificateDataState<'a> {
    fn from(info: CertificateInfo) -> Self {
        Self {
            id: info.cert_id.into(),
            name: info.name.into(),
            certificate: info.certificate.into(),
            issuer: info.issuer.into(),
            domains: strings_list(info.domains),
            not_before: info.not_before.into(),
            not_after: info.not_after.into(),
        }
    }
}

/// Single certificate with the given name
fn find_by_name(certificates: Vec<CertificateInfo>, name: &str) -> Result<CertificateInfo, Error> {
    let mut matching = certificates.into_iter().filter(|cert| cert.name == name);
    match (matching.next(), matching.next()) {
        (Some(cert), None) => Ok(cert),
        (None, _) => Err(Error::NotFound(format!("certificate named `{name}`"))),
        (Some(_), Some(_)) => Err(Error::InvalidConfig(format!(
            "several certificates are named `{name}`, use `id` instead"
        ))),
    }
}

#[async_trait]
impl DataSource for SslCertificateDataSource {
    type State<'a> = CertificateDataState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => optional_computed(AttributeType::String, "Id of the certificate"),
                    "name" => optional_computed(AttributeType::String, "Name of the certificate"),
                    "certificate" => computed(AttributeType::String, "PEM encoded certificate chain"),
                    "issuer" => computed(AttributeType::String, "Issuer of the certificate"),
                    "domains" => computed(string_list(), "Domains covered by the certificate"),
                    "not_before" => computed(AttributeType::String, "Start of validity"),
                    "not_after" => computed(AttributeType::String, "End of validity"),
                },
                description: Description::plain("Reads an SSL certificate"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        let lookups = [&config.id, &config.name];
        let unknown = lookups.iter().any(|lookup| lookup.is_unknown());
        if !unknown && lookups.iter().filter(|lookup| lookup.is_value()).count() != 1 {
            diags.root_error_short("Exactly one of `id` and `name` must be given");
        }
        no_errors(diags)
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let clients = self.connection.get(diags).await?;
        let service = SslCertificateService::new(&clients.api);
        let result = match (config.id.as_deref_option(), config.name.as_deref_option()) {
            (Some(id), _) => service.get(id).await,
            (None, Some(name)) => service
                .list()
                .await
                .and_then(|certificates| find_by_name(certificates, name)),
            (None, None) => Err(Error::InvalidConfig("`id` or `name` is required".into())),
        };
        let info = or_report(diags, "Could not read certificate", result)?;
        Some(info.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(id: &str, name: &str) -> CertificateInfo {
        CertificateInfo {
            cert_id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn lookup_by_name() {
        let certs = vec![named("1", "www"), named("2", "api")];
        assert_eq!(find_by_name(certs, "api").unwrap().cert_id, "2");

        let certs = vec![named("1", "www")];
        assert!(find_by_name(certs, "api").unwrap_err().is_not_found());

        let certs = vec![named("1", "www"), named("2", "www")];
        assert!(matches!(
            find_by_name(certs, "www"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn id_and_name_are_exclusive() {
        let data_source = SslCertificateDataSource::default();
        let mut diags = Diagnostics::default();
        let config = CertificateDataState {
            id: "1".into(),
            name: "www".into(),
            ..Default::default()
        };
        assert!(data_source.validate(&mut diags, config).await.is_none());

        let mut diags = Diagnostics::default();
        let config = CertificateDataState {
            name: "www".into(),
            ..Default::default()
        };
        assert!(data_source.validate(&mut diags, config).await.is_some());
    }
}
