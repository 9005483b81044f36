use amf::protocols::nas::cause;
use amf::protocols::ngap::NasCause;
use amf_tests::{MockUe, framework::*, subscribed_snssai};

#[async_std::test]
async fn attach() -> anyhow::Result<()> {
    let (amf, gnb, network, logger) = init()?;
    let mut ue = MockUe::new(1, &amf, &gnb, &network, &logger);

    // When a UE with nothing else to do registers
    ue.send_registration_request(false).await?;
    ue.handle_authentication().await?;
    ue.handle_security_mode().await?;
    let accept = ue.handle_registration_accept().await?;

    // Then it is given a GUTI, its tracking area and its subscribed slice
    let Some(guti) = accept.guti else {
        anyhow::bail!("No GUTI in Registration Accept")
    };
    assert_eq!(guti.guami.amf_ids, [0xca, 0xfe, 0x00]);
    assert_eq!(accept.tai_list.len(), 1);
    assert_eq!(accept.allowed_nssai, vec![subscribed_snssai()]);
    assert_eq!(accept.t3512_value, Some(3600));
    assert_eq!(accept.negotiated_drx_parameters, Some(0x02));
    assert!(network.is_registered_at_udm(&ue.imsi));
    assert_eq!(network.am_policy_count(), 1);

    // And the AMF releases the signalling connection but keeps the UE context.
    assert_eq!(ue.handle_ue_context_release().await?, NasCause::NormalRelease);
    wait_for_ue_count(&amf, 1).await
}

#[async_std::test]
async fn registration_outside_served_area_is_rejected() -> anyhow::Result<()> {
    let (amf, gnb, network, logger) = init()?;
    let mut ue = MockUe::new(1, &amf, &gnb, &network, &logger);
    ue.tac = Some([0x00, 0x00, 0x02]);

    ue.send_registration_request(false).await?;
    assert_eq!(
        ue.receive_registration_reject().await?,
        cause::TRACKING_AREA_NOT_ALLOWED
    );
    gnb.expect_no_ngap().await
}

#[async_std::test]
async fn wrong_res_star_is_rejected() -> anyhow::Result<()> {
    let (amf, gnb, network, logger) = init()?;
    let mut ue = MockUe::new(1, &amf, &gnb, &network, &logger);

    ue.send_registration_request(false).await?;
    ue.fail_authentication().await?;
    ue.receive_authentication_reject().await?;
    assert!(!network.is_registered_at_udm(&ue.imsi));
    Ok(())
}
