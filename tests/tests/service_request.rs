use amf::data::{Guami, Guti};
use amf::expect_nas;
use amf::protocols::nas::{ServiceType, cause};
use amf::protocols::ngap::{NasCause, NgapMessage};
use amf_tests::{MockUe, framework::*};
use anyhow::{anyhow, bail};

#[async_std::test]
async fn idle_ue_returns_with_service_request() -> anyhow::Result<()> {
    let (amf, gnb, network, logger) = init()?;

    // Given a registered UE in idle
    let mut ue = MockUe::new(1, &amf, &gnb, &network, &logger);
    ue.register(false).await?;
    ue.handle_ue_context_release().await?;

    // When it sends a Service Request
    ue.send_service_request(ServiceType::Signalling, None)
        .await?;

    // Then the AMF sets up the RAN side of its context with a fresh KgNB.
    let request = ue.handle_initial_context_setup().await?;
    let nas = request
        .nas
        .ok_or_else(|| anyhow!("No NAS in Initial Context Setup Request"))?;
    expect_nas!(ServiceAccept, nas.message)?;
    assert_ne!(request.security_key, [0u8; 32]);
    assert_eq!(request.next_hop_chaining_count, 1);
    assert_eq!(amf.ue_count(), 1);
    Ok(())
}

#[async_std::test]
async fn connected_ue_gets_service_accept_on_its_connection() -> anyhow::Result<()> {
    let (amf, gnb, network, logger) = init()?;

    // Given a registered UE that kept its signalling connection
    let mut ue = MockUe::new(1, &amf, &gnb, &network, &logger);
    ue.register(true).await?;

    // When it sends a Service Request on that connection
    ue.send_connected_service_request(ServiceType::Signalling)
        .await?;

    // Then the Service Accept comes back in a plain DL NAS Transport.
    let pdu = gnb.receive_ngap().await?;
    let NgapMessage::DownlinkNasTransport(nas) = pdu.message else {
        bail!("Expected DL NAS Transport, got {}", pdu.message.name())
    };
    expect_nas!(ServiceAccept, nas.message)?;
    gnb.expect_no_ngap().await
}

#[async_std::test]
async fn unknown_ue_is_rejected() -> anyhow::Result<()> {
    let (amf, gnb, network, logger) = init()?;

    // Given a UE holding a GUTI the AMF never allocated
    let mut ue = MockUe::new(1, &amf, &gnb, &network, &logger);
    ue.guti = Some(Guti {
        guami: Guami {
            plmn: [0x02, 0xf8, 0x39],
            amf_ids: [0xca, 0xfe, 0x00],
        },
        tmsi: [0x12, 0x34, 0x56, 0x78],
    });

    // When it sends a Service Request
    ue.send_service_request(ServiceType::Data, None).await?;

    // Then it is told to register and the new context is dropped.
    assert_eq!(
        ue.receive_service_reject().await?,
        cause::UE_IDENTITY_CANNOT_BE_DERIVED
    );
    assert_eq!(ue.handle_ue_context_release().await?, NasCause::NormalRelease);
    wait_for_ue_count(&amf, 0).await
}
