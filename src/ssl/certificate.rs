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
use tf_provider::value::{Value, ValueEmpty, ValueList, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, Resource};
use time::OffsetDateTime;
use tracing::warn;

use crate::connection::Connection;
use crate::schema::{computed, required, sensitive, string_list};
use crate::service::ssl::{CertificateInfo, CertificateRequest};
use crate::service::SslCertificateService;
use crate::ssl::{check_certificate, check_private_key, is_expired, same_pem};
use crate::utils::{check_not_empty, no_errors, or_report, report, string_or, strings_list};

#[derive(Debug, Clone, Default)]
pub struct SslCertificateResource {
    connection: Connection,
}

impl SslCertificateResource {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CertificateState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub certificate: ValueString<'a>,
    pub private_key: ValueString<'a>,
    pub issuer: ValueString<'a>,
    pub domains: ValueList<ValueString<'a>>,
    pub not_before: ValueString<'a>,
    pub not_after: ValueString<'a>,
}

impl<'a> CertificateState<'a> {
    /// Refresh from the API, the private key is never returned and is left untouched
    fn apply_info(&mut self, info: CertificateInfo) {
        if is_expired(&info.not_after, OffsetDateTime::now_utc()) {
            warn!(cert_id = %info.cert_id, not_after = %info.not_after, "certificate has expired");
        }
        let keep_certificate = self
            .certificate
            .as_deref_option()
            .map_or(false, |prior| same_pem(prior, &info.certificate));
        if !keep_certificate {
            self.certificate = info.certificate.into();
        }
        self.id = info.cert_id.into();
        self.name = info.name.into();
        self.issuer = info.issuer.into();
        self.domains = strings_list(info.domains);
        self.not_before = info.not_before.into();
        self.not_after = info.not_after.into();
    }

    fn computed_unknown(&mut self) {
        self.issuer = Value::Unknown;
        self.domains = Value::Unknown;
        self.not_before = Value::Unknown;
        self.not_after = Value::Unknown;
    }
}

#[async_trait]
impl Resource for SslCertificateResource {
    type State<'a> = CertificateState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => computed(AttributeType::String, "Id of the certificate"),
                    "name" => required(AttributeType::String, "Name of the certificate"),
                    "certificate" => required(AttributeType::String, "PEM encoded certificate chain"),
                    "private_key" => sensitive(required(AttributeType::String, "PEM encoded private key, never read back")),
                    "issuer" => computed(AttributeType::String, "Issuer of the certificate"),
                    "domains" => computed(string_list(), "Domains covered by the certificate"),
                    "not_before" => computed(AttributeType::String, "Start of validity"),
                    "not_after" => computed(AttributeType::String, "End of validity"),
                },
                description: Description::plain("SSL certificate used by CDN domains"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        check_not_empty(diags, &config.name, AttributePath::new("name"));
        check_certificate(diags, &config.certificate, AttributePath::new("certificate"));
        check_private_key(diags, &config.private_key, AttributePath::new("private_key"));
        no_errors(diags)
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let clients = self.connection.get(diags).await?;
        let cert_id = string_or(&state.id, "").to_owned();
        match SslCertificateService::new(&clients.api).get(&cert_id).await {
            Ok(info) => state.apply_info(info),
            Err(err) if err.is_not_found() => {
                warn!(cert_id = %cert_id, "certificate not found, removing it from the state");
                return None;
            }
            Err(err) => {
                report(diags, "Could not read certificate", err);
                return None;
            }
        }
        Some((state, private_state))
    }

    async fn plan_create<'a>(
        &self,
        _diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state;
        state.id = Value::Unknown;
        state.computed_unknown();
        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut state = proposed_state;
        if prior_state.certificate != state.certificate {
            state.computed_unknown();
        }
        Some((state, prior_private_state, vec![]))
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::PrivateState<'a>> {
        Some(prior_private_state)
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let clients = self.connection.get(diags).await?;
        let service = SslCertificateService::new(&clients.api);
        let mut state = planned_state;

        let cert_id = or_report(
            diags,
            "Could not upload certificate",
            service
                .create(&CertificateRequest {
                    cert_id: None,
                    name: string_or(&state.name, ""),
                    certificate: string_or(&state.certificate, ""),
                    private_key: string_or(&state.private_key, ""),
                })
                .await,
        )?;
        let info = or_report(
            diags,
            "Could not read uploaded certificate",
            service.get(&cert_id).await,
        )?;
        state.apply_info(info);
        Some((state, planned_private_state))
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let clients = self.connection.get(diags).await?;
        let service = SslCertificateService::new(&clients.api);
        let mut state = planned_state;
        let cert_id = string_or(&state.id, "").to_owned();

        or_report(
            diags,
            "Could not update certificate",
            service
                .update(&CertificateRequest {
                    cert_id: Some(&cert_id),
                    name: string_or(&state.name, ""),
                    certificate: string_or(&state.certificate, ""),
                    private_key: string_or(&state.private_key, ""),
                })
                .await,
        )?;
        let info = or_report(
            diags,
            "Could not read updated certificate",
            service.get(&cert_id).await,
        )?;
        state.apply_info(info);
        Some((state, planned_private_state))
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let clients = self.connection.get(diags).await?;
        match SslCertificateService::new(&clients.api)
            .delete(string_or(&state.id, ""))
            .await
        {
            Err(err) if !err.is_not_found() => {
                report(diags, "Could not delete certificate", err);
                None
            }
            _ => Some(()),
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let clients = self.connection.get(diags).await?;
        let info = or_report(
            diags,
            "Could not import certificate",
            SslCertificateService::new(&clients.api).get(&id).await,
        )?;
        let mut state = CertificateState::default();
        state.apply_info(info);
        Some((state, Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;
    use crate::ssl::tests::{CERTIFICATE, PRIVATE_KEY};

    fn info() -> CertificateInfo {
        CertificateInfo {
            cert_id: "c-1".into(),
            name: "www".into(),
            certificate: format!("\n{CERTIFICATE}\n"),
            issuer: "Example CA".into(),
            domains: vec!["www.example.com".into()],
            not_before: "2024-01-01T00:00:00Z".into(),
            not_after: "2099-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn refresh_keeps_private_key_and_formatting() {
        let mut state = CertificateState {
            name: "www".into(),
            certificate: CERTIFICATE.into(),
            private_key: PRIVATE_KEY.into(),
            ..Default::default()
        };
        state.apply_info(info());
        assert_eq!(state.id, Value::Value(Cow::Borrowed("c-1")));
        assert_eq!(state.certificate, Value::Value(Cow::Borrowed(CERTIFICATE)));
        assert_eq!(state.private_key, Value::Value(Cow::Borrowed(PRIVATE_KEY)));
        assert_eq!(state.issuer, Value::Value(Cow::Borrowed("Example CA")));
        assert_eq!(state.domains, strings_list(["www.example.com"]));
    }

    #[test]
    fn import_leaves_private_key_null() {
        let mut state = CertificateState::default();
        state.apply_info(info());
        assert!(state.private_key.is_null());
        assert!(state.certificate.is_value());
        assert_eq!(state.not_after, Value::Value(Cow::Borrowed("2099-01-01T00:00:00Z")));
    }

    #[tokio::test]
    async fn certificate_change_recomputes_details() {
        let resource = SslCertificateResource::default();
        let mut diags = Diagnostics::default();
        let mut prior = CertificateState {
            id: "c-1".into(),
            certificate: CERTIFICATE.into(),
            ..Default::default()
        };
        prior.apply_info(info());
        let proposed = CertificateState {
            certificate: format!("{CERTIFICATE}{CERTIFICATE}").into(),
            ..prior.clone()
        };
        let (state, _, triggers) = resource
            .plan_update(
                &mut diags,
                prior,
                proposed.clone(),
                proposed,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(triggers.is_empty());
        assert!(state.issuer.is_unknown());
        assert_eq!(state.id, Value::Value(Cow::Borrowed("c-1")));
    }

    #[tokio::test]
    async fn validate_checks_pem() {
        let resource = SslCertificateResource::default();
        let mut diags = Diagnostics::default();
        let config = CertificateState {
            name: "www".into(),
            certificate: PRIVATE_KEY.into(),
            private_key: CERTIFICATE.into(),
            ..Default::default()
        };
        assert!(resource.validate(&mut diags, config).await.is_none());
        assert_eq!(diags.errors.len(), 2);
    }
}
